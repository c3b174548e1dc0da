//! CropSense error types

use thiserror::Error;

/// CropSense error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input — the caller's fault, not retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// No such record, or the record is not owned by / visible to the caller
    #[error("Not found: {0}")]
    NotFound(String),

    /// Binary persistence failed — may be retried by the caller
    #[error("Storage error: {0}")]
    Storage(String),

    /// An external capability (classifier or chat provider) failed or timed out
    #[error("Capability error: {0}")]
    Capability(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for CropSense operations
pub type Result<T> = std::result::Result<T, Error>;
