//! User interface module - console output and progress display.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - `progress` - Busy indicator shown while processes run

pub mod formatter;
pub mod progress;

// Re-export formatter functions for convenience
pub use formatter::{
    display_error, display_exec, display_log, display_output_line, display_success,
    display_versions, display_warning,
};
pub use progress::BusyIndicator;
