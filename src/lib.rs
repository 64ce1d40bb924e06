pub mod changelog;
pub mod cli;
pub mod config;
pub mod error;
pub mod git_ops;
pub mod supervisor;
pub mod ui;

pub use error::{ExecutionError, FormatError, Result, ShipitError};
