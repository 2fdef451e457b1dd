use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while deriving metrics or writing reports
#[derive(Error, Debug)]
pub enum ReportError {
    /// The measured test window has no length, so no rate can be derived
    #[error("test duration is zero; no metrics derived")]
    ZeroDuration,

    /// The XML report destination could not be opened for writing
    #[error("error opening file to write log: {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A shell command could not be started
    #[error("error opening process to execute command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The open-file soft limit is below the number of connections the test opens
    #[error("soft limit is too small: limit is {soft_limit}; but total connections will be {expected} (or more on receiver)")]
    ResourceLimitExceeded { expected: u64, soft_limit: u64 },

    /// I/O error while writing an already opened report
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed value in a run record or configuration
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using ReportError
pub type Result<T> = std::result::Result<T, ReportError>;
