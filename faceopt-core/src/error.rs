//! Error types for faceopt-core

use thiserror::Error;

/// Main error type for the faceopt-core library
#[derive(Error, Debug)]
pub enum Error {
    /// A session is already running on this runner
    #[error("an optimization is already running (session {session_id}); wait for it to finish")]
    AlreadyRunning { session_id: String },

    /// Imported document parsed but does not carry a usable configuration
    #[error("invalid configuration format: {0}")]
    InvalidFormat(String),

    /// Imported document could not be read or decoded
    #[error("file cannot be read: {0}")]
    UnreadableFile(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Result synthesis failed
    #[error("result synthesis failed: {0}")]
    Synthesis(String),

    /// No async runtime available to drive a run
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Runner state was inconsistent
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for the error returned when a second run is requested
    pub fn is_already_running(&self) -> bool {
        matches!(self, Error::AlreadyRunning { .. })
    }
}

/// Result type alias for faceopt-core
pub type Result<T> = std::result::Result<T, Error>;
