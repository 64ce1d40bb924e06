use std::fs;

use serial_test::serial;
use shipit::config::{load_config, Config, CONFIG_FILE_NAME};

#[test]
#[serial]
fn test_defaults_without_any_file() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    std::env::set_var("XDG_CONFIG_HOME", home.path());

    let config = load_config(None, project.path()).unwrap();
    assert_eq!(config, Config::default());

    std::env::remove_var("XDG_CONFIG_HOME");
}

#[test]
#[serial]
fn test_project_file_wins_over_user_file() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    std::env::set_var("XDG_CONFIG_HOME", home.path());

    fs::write(home.path().join(CONFIG_FILE_NAME), "changelog = \"USER.md\"\n").unwrap();
    fs::write(
        project.path().join(CONFIG_FILE_NAME),
        "changelog = \"PROJECT.md\"\n",
    )
    .unwrap();

    let config = load_config(None, project.path()).unwrap();
    assert_eq!(config.changelog, "PROJECT.md");

    std::env::remove_var("XDG_CONFIG_HOME");
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_user_file_is_fallback() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    std::env::set_var("XDG_CONFIG_HOME", home.path());

    fs::write(
        home.path().join(CONFIG_FILE_NAME),
        "[vcs]\nprogram = \"/usr/local/bin/git\"\n",
    )
    .unwrap();

    let config = load_config(None, project.path()).unwrap();
    assert_eq!(config.vcs.program, "/usr/local/bin/git");

    std::env::remove_var("XDG_CONFIG_HOME");
}

#[test]
fn test_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        "[scripts]\nbuild = \"ci/build\"\n\n[execution]\ntimeout_secs = 30\nkill_on_timeout = false\n",
    )
    .unwrap();

    let config = load_config(Some(&path), dir.path()).unwrap();
    assert_eq!(config.scripts.build, "ci/build");
    assert_eq!(config.execution.timeout_secs, 30);
    assert!(!config.execution.kill_on_timeout);
}

#[test]
fn test_missing_explicit_path_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(Some(&dir.path().join("nope.toml")), dir.path()).unwrap_err();
    assert!(err.to_string().contains("nope.toml"));
}

#[test]
fn test_invalid_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(CONFIG_FILE_NAME), "[execution]\ndrain_interval_ms = 0\n").unwrap();
    let err = load_config(None, dir.path()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("drain_interval_ms"));
    assert!(msg.contains(CONFIG_FILE_NAME));
    assert_eq!(msg.matches("Configuration error").count(), 1);
}

#[test]
fn test_malformed_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "changelog = [").unwrap();

    let err = load_config(Some(&path), dir.path()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.starts_with("Configuration error: in '"));
    assert!(msg.contains("broken.toml"));
}
