//! Busy indicator shown while a non-verbose build runs.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner that runs until dropped.
///
/// Dropping clears the spinner line on every exit path, including errors.
pub struct BusyIndicator {
    spinner: ProgressBar,
}

impl BusyIndicator {
    pub fn start(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "falling back to default spinner style");
                ProgressStyle::default_spinner()
            });
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        BusyIndicator { spinner }
    }

    /// Updates the text next to the spinner
    pub fn set_message(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }

    /// Prints a line above the spinner without disturbing it
    pub fn println(&self, line: &str) {
        self.spinner.println(line);
    }
}

impl Drop for BusyIndicator {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}
