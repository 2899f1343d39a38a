//! Error types for the capture service

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the capture service
#[derive(Error, Debug)]
pub enum Error {
    /// The rendering engine process failed to launch
    #[error("Engine start failed: {0}")]
    EngineStart(String),

    /// A capture exceeded its maximum duration
    #[error("Capture timed out after {0}ms")]
    CaptureTimeout(u64),

    /// The requested page element could not be found
    #[error("Capture target not found: {0}")]
    TargetNotFound(String),

    /// A capture failed inside the engine (navigation, rendering, etc.)
    #[error("Capture failed: {0}")]
    Capture(String),

    /// A recurring job with this id already exists
    #[error("Duplicate job id: {0}")]
    DuplicateJob(String),

    /// No recurring job with this id exists
    #[error("Unknown job id: {0}")]
    JobNotFound(String),

    /// Failed to write a result or prune old results
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// The engine worker went away before delivering a result
    #[error("Engine worker is gone")]
    Closed,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Persistence(err.to_string())
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Capture(err.to_string())
    }
}
