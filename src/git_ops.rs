use std::io::Write;
use std::path::Path;

use semver::Version;
use tempfile::NamedTempFile;

use crate::changelog::VersionEntry;
use crate::error::Result;
use crate::supervisor::CommandSpec;

/// Annotation for a release tag, written to a temporary file.
///
/// The file is removed when the value is dropped.
pub struct TagMessage {
    file: NamedTempFile,
}

impl TagMessage {
    /// Writes the entry's bullets, one `* <bullet>` per line, to a fresh temp file
    pub fn write(entry: &VersionEntry) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("shipit-tag-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(format_tag_message(entry).as_bytes())?;
        file.flush()?;
        Ok(TagMessage { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Tag annotation text for an entry
pub fn format_tag_message(entry: &VersionEntry) -> String {
    entry
        .bullets
        .iter()
        .map(|bullet| format!("* {}", bullet))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `<vcs> tag <version> -a -F <message_file>`
pub fn tag_command(
    program: &str,
    working_dir: &Path,
    version: &Version,
    message_file: &Path,
) -> CommandSpec {
    CommandSpec::new(program, working_dir)
        .args(["tag".to_string(), version.to_string(), "-a".to_string(), "-F".to_string()])
        .arg(message_file.to_string_lossy())
}

/// `<vcs> push --tags`
pub fn push_tags_command(program: &str, working_dir: &Path) -> CommandSpec {
    CommandSpec::new(program, working_dir).args(["push", "--tags"])
}
