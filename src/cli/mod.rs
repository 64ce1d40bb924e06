//! Command orchestration shared by the `build` and `release` subcommands.

pub mod orchestration;

pub use orchestration::{ReleaseKind, ReleaseOrchestrator, ReleaseReport, ReleaseRequest};
