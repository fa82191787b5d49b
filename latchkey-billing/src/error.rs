use latchkey_directory::DirectoryError;
use thiserror::Error;

/// Errors surfaced while reconciling billing events.
#[derive(Debug, Error)]
pub enum BillingError {
    /// The webhook body was not a well-formed provider envelope.
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// The entitlement write against the directory failed.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}

pub type BillingResult<T> = Result<T, BillingError>;
