//! Changelog parsing.
//!
//! Turns Markdown-like changelog text into an ordered list of [`VersionEntry`]
//! values. Entries are introduced by a line starting with `##`; everything
//! before the first entry is treated as a document header, and a line starting
//! with `---` after the first entry starts a footer that is ignored.
//!
//! ```text
//! # Changelog
//!
//! ## 1.0.4
//!
//! * Fix subtle bug
//! * Fix another thing
//!
//! ## 1.1.0
//!
//! * Add some function
//! ```

use std::fmt;

use semver::Version;
use tracing::debug;

use crate::error::FormatError;

const ENTRY_MARKER: &str = "##";
const FOOTER_MARKER: &str = "---";
const BULLET_MARKER: char = '*';

/// One version's worth of recorded changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: Version,
    /// Never empty
    pub bullets: Vec<String>,
}

impl fmt::Display for VersionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "===== {} =====", self.version)?;
        for bullet in &self.bullets {
            write!(f, "\n * {}", bullet)?;
        }
        Ok(())
    }
}

/// Parses changelog text into entries, in the order they appear.
///
/// # Errors
/// * [`FormatError::NoEntries`] - no `##` entry marker in the text
/// * [`FormatError::InvalidVersion`] - an entry heading is not a semantic version
/// * [`FormatError::NoBullets`] - an entry documents no `*` bullet lines
pub fn parse(text: &str) -> Result<Vec<VersionEntry>, FormatError> {
    let markers = line_starts(text, ENTRY_MARKER);
    let first = *markers.first().ok_or(FormatError::NoEntries)?;

    let entries_text = &text[first..];
    let entries_text = match line_starts(entries_text, FOOTER_MARKER).first() {
        Some(&footer) => &entries_text[..footer],
        None => entries_text,
    };

    let markers = line_starts(entries_text, ENTRY_MARKER);
    let mut entries = Vec::with_capacity(markers.len());

    for (i, &start) in markers.iter().enumerate() {
        let end = markers.get(i + 1).copied().unwrap_or(entries_text.len());
        let block = &entries_text[start + ENTRY_MARKER.len()..end];

        if let Some(entry) = parse_entry(block)? {
            entries.push(entry);
        }
    }

    debug!(count = entries.len(), "parsed changelog entries");
    Ok(entries)
}

/// The entry to build: the last one in file order.
///
/// Changelogs are expected to be written oldest first, newest at the bottom.
pub fn latest_entry(entries: &[VersionEntry]) -> Option<&VersionEntry> {
    entries.last()
}

/// The entry with the highest semantic version precedence.
///
/// Used to detect changelogs whose file order disagrees with version order.
pub fn newest_by_precedence(entries: &[VersionEntry]) -> Option<&VersionEntry> {
    entries.iter().max_by_key(|entry| &entry.version)
}

fn parse_entry(block: &str) -> Result<Option<VersionEntry>, FormatError> {
    let mut lines = block.lines().filter(|line| !line.trim().is_empty());

    let Some(heading) = lines.next() else {
        return Ok(None);
    };
    let token = heading.trim();

    // Leftover HTML comment from a link footer
    if token.starts_with('<') {
        return Ok(None);
    }

    let version = Version::parse(token).map_err(|source| FormatError::InvalidVersion {
        token: token.to_string(),
        block: block.to_string(),
        source,
    })?;

    let bullets: Vec<String> = lines
        .map(str::trim)
        .filter_map(|line| line.strip_prefix(BULLET_MARKER))
        .map(str::trim)
        .filter(|bullet| !bullet.is_empty())
        .map(str::to_string)
        .collect();

    if bullets.is_empty() {
        return Err(FormatError::NoBullets {
            version: version.to_string(),
            block: block.to_string(),
        });
    }

    Ok(Some(VersionEntry { version, bullets }))
}

/// Byte offsets of every line that starts with `marker`
fn line_starts(text: &str, marker: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.starts_with(marker) {
            offsets.push(offset);
        }
        offset += line.len();
    }

    offsets
}
