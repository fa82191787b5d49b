//! Error types for the pairing module.

use thiserror::Error;

/// Result type for pairing operations.
pub type PairingResult<T> = Result<T, PairingError>;

/// Errors from link state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    /// The code is unknown or its window has closed. The two cases are
    /// deliberately not distinguished here; [`crate::LinkStore::get`] is
    /// how callers that need the difference observe it.
    #[error("unknown or expired link code")]
    InvalidOrExpiredCode,

    /// The link's credential was already handed out.
    #[error("link already consumed")]
    ConsumedAlready,

    /// The link has not been approved yet, so there is nothing to consume.
    #[error("link not ready")]
    NotReady,
}
