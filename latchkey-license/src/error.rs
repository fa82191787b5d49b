//! Error types for the licensing module.

use latchkey_directory::DirectoryError;
use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Token is malformed (parts, base64, or payload JSON).
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    /// HMAC tag or Ed25519 signature verification failed.
    #[error("token signature invalid")]
    InvalidSignature,

    /// Claims decoded but are not acceptable (type, issuer, or expiry).
    #[error("invalid token claims: {0}")]
    InvalidClaims(String),

    /// The key's version no longer matches the user's current version.
    #[error("api key has been revoked")]
    KeyRevoked,

    /// No active entitlement for the requested product.
    #[error("no active entitlement")]
    NotEntitled,

    /// The entitlement's validity window has passed.
    #[error("entitlement expired")]
    Expired,

    /// Directory failure.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
