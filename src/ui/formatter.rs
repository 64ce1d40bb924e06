//! Pure formatting functions for UI output.
//!
//! This module contains all display/formatting logic separated from the
//! orchestration flow.

use console::style;

use crate::changelog::VersionEntry;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a warning in yellow.
pub fn display_warning(message: &str) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), message);
}

/// Print the command line about to be executed.
pub fn display_exec(command: &str) {
    println!("{} {}", style("EXEC>").cyan().bold(), command);
}

/// Print one line of process output as it arrives.
pub fn display_output_line(line: &str) {
    println!("{}", line);
}

/// Display a post-mortem log captured from failed processes.
///
/// # Arguments
/// * `log` - Every captured output line, in order
pub fn display_log(log: &[String]) {
    if log.is_empty() {
        return;
    }
    eprintln!("\n{}", style("Log:").bold());
    for line in log {
        eprintln!("{}", line);
    }
}

/// Display parsed changelog entries in file order, newest expected last.
pub fn display_versions(entries: &[VersionEntry]) {
    println!("{}", style(format!("Found {} versions", entries.len())).bold());
    for entry in entries {
        println!("\n{}", entry);
    }
}
