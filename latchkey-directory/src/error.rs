//! Error types for directory operations.

use thiserror::Error;

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur talking to the profile directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory has no record for this user.
    #[error("user not found: {0}")]
    NotFound(String),

    /// Network or HTTP-level failure.
    #[error("directory request failed: {0}")]
    Network(String),

    /// The directory answered with something we could not decode.
    #[error("unexpected directory response: {0}")]
    BadResponse(String),

    /// A write was rejected before reaching the directory.
    #[error("invalid metadata write: {0}")]
    InvalidWrite(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
