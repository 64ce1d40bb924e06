use std::fs;
use std::process::Command;

use serial_test::serial;

fn shipit() -> Command {
    Command::new(env!("CARGO_BIN_EXE_shipit"))
}

#[test]
#[serial]
fn test_shipit_help() {
    let output = shipit().arg("--help").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("build"));
    assert!(stdout.contains("release"));
}

#[test]
#[serial]
fn test_versions_lists_changelog() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("CHANGELOG.md"),
        "# Title\n\n## 1.0.0\n\n* First\n\n## 1.1.0\n\n* Third\n",
    )
    .unwrap();

    let output = shipit()
        .arg("--project-dir")
        .arg(dir.path())
        .arg("versions")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Found 2 versions"));
    assert!(stdout.contains("===== 1.1.0 ====="));
}

#[test]
#[serial]
fn test_missing_script_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();

    let output = shipit()
        .arg("-C")
        .arg(dir.path())
        .arg("build")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Could not find script"));
}

#[cfg(unix)]
#[test]
#[serial]
fn test_build_succeeds() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("CHANGELOG.md"), "## 0.1.0\n* initial\n").unwrap();
    fs::create_dir(dir.path().join("scripts")).unwrap();
    let script = dir.path().join("scripts/build.sh");
    fs::write(&script, "#!/bin/sh\necho \"built $1 $2\"\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let output = shipit()
        .arg("-C")
        .arg(dir.path())
        .args(["build", "--verbose"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("EXEC>"));
    assert!(stdout.contains("built "));
    assert!(stdout.contains("0.1.0"));
    assert!(stdout.contains("OK :)"));
}
