use std::time::Duration;

use thiserror::Error;

/// Unified error type for shipit operations
#[derive(Error, Debug)]
pub enum ShipitError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("{0}")]
    Orchestration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unhandled error: {message}\n\nLog:\n\n{}", .log.join("\n"))]
    Unhandled { message: String, log: Vec<String> },
}

/// Convenience type alias for Results in shipit
pub type Result<T> = std::result::Result<T, ShipitError>;

impl ShipitError {
    /// Create an orchestration error carrying remediation instructions
    pub fn orchestration(msg: impl Into<String>) -> Self {
        ShipitError::Orchestration(msg.into())
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ShipitError::Config(msg.into())
    }

    /// Output captured from external processes, if the error carries any
    pub fn log(&self) -> &[String] {
        match self {
            ShipitError::Execution(e) => e.log(),
            ShipitError::Unhandled { log, .. } => log,
            _ => &[],
        }
    }
}

/// The changelog text does not have the expected structure
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Could not find any entries in changelog")]
    NoEntries,

    #[error("Invalid changelog entry format: could not parse version '{token}': {source}\n<entry>\n{block}\n</entry>")]
    InvalidVersion {
        token: String,
        block: String,
        #[source]
        source: semver::Error,
    },

    #[error("Invalid changelog entry format: no bullets for version {version}\n<entry>\n{block}\n</entry>")]
    NoBullets { version: String, block: String },
}

/// An external process could not be started, timed out, or failed
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Could not start process with command {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Lost track of process for command {command}: {source}")]
    Wait {
        command: String,
        log: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    #[error("Process for command {command} timed out after {timeout:?}")]
    TimedOut {
        command: String,
        timeout: Duration,
        log: Vec<String>,
    },

    #[error("Process for command {command} exited with code {code}")]
    NonZeroExit {
        command: String,
        code: i32,
        log: Vec<String>,
    },
}

impl ExecutionError {
    /// Lines captured from the process before the failure
    pub fn log(&self) -> &[String] {
        match self {
            ExecutionError::Spawn { .. } => &[],
            ExecutionError::Wait { log, .. }
            | ExecutionError::TimedOut { log, .. }
            | ExecutionError::NonZeroExit { log, .. } => log,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::TimedOut { .. })
    }

    /// Exit code of the process, when it ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionError::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShipitError::config("timeout_secs must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: timeout_secs must be positive"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ShipitError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_orchestration_error_is_verbatim() {
        let err = ShipitError::orchestration("Could not find script: 'x'");
        assert_eq!(err.to_string(), "Could not find script: 'x'");
    }

    #[test]
    fn test_unhandled_includes_log() {
        let err = ShipitError::Unhandled {
            message: "disk full".to_string(),
            log: vec!["line one".to_string(), "line two".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Unhandled error: disk full"));
        assert!(msg.ends_with("line one\nline two"));
        assert_eq!(err.log().len(), 2);
    }

    #[test]
    fn test_execution_error_accessors() {
        let err = ExecutionError::NonZeroExit {
            command: "build.sh app 1.0.0".to_string(),
            code: 3,
            log: vec!["boom".to_string()],
        };
        assert_eq!(err.exit_code(), Some(3));
        assert!(!err.is_timeout());
        assert_eq!(err.log(), ["boom".to_string()]);
        assert_eq!(
            err.to_string(),
            "Process for command build.sh app 1.0.0 exited with code 3"
        );

        let timeout = ExecutionError::TimedOut {
            command: "sleep 10".to_string(),
            timeout: Duration::from_secs(1),
            log: vec![],
        };
        assert!(timeout.is_timeout());
        assert_eq!(timeout.exit_code(), None);
    }

    #[test]
    fn test_format_error_includes_block() {
        let err = FormatError::NoBullets {
            version: "1.0.0".to_string(),
            block: " 1.0.0\n\nnothing here".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("no bullets for version 1.0.0"));
        assert!(msg.contains("<entry>\n 1.0.0\n\nnothing here\n</entry>"));
    }

    #[test]
    fn test_execution_log_surfaces_through_umbrella() {
        let err: ShipitError = ExecutionError::TimedOut {
            command: "x".to_string(),
            timeout: Duration::from_millis(10),
            log: vec!["partial".to_string()],
        }
        .into();
        assert_eq!(err.log(), ["partial".to_string()]);
    }
}
