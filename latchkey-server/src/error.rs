//! HTTP error mapping.
//!
//! Every failure a handler can surface maps onto one taxonomy entry,
//! serialized as `{"error": <message>, "kind": <stable identifier>}`.
//! CLIs branch on `kind`; the message is for humans.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use latchkey_billing::BillingError;
use latchkey_directory::DirectoryError;
use latchkey_license::LicenseError;
use latchkey_pairing::PairingError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::sessions::SessionError;

/// Wire shape of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

/// Request failures, classified by what the caller should do next.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or unrecognized session credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The API key failed format, signature, or claims checks.
    #[error("invalid api key: {0}")]
    InvalidKey(String),

    /// The API key was valid once but has been revoked since.
    #[error("api key has been revoked")]
    KeyRevoked,

    /// No active entitlement covers the request.
    #[error("no active entitlement")]
    NotEntitled,

    /// The entitlement's validity window has passed.
    #[error("entitlement expired")]
    Expired,

    /// Nothing at this code or path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The pairing code cannot be used (unknown or expired).
    #[error("pairing code is invalid or expired")]
    CodeUnusable,

    /// The pairing code existed but its time ran out.
    #[error("pairing code expired")]
    CodeExpired,

    /// The pairing code's credential was already collected.
    #[error("pairing code already consumed")]
    Consumed,

    /// The pairing code has not been approved yet.
    #[error("pairing code not ready")]
    NotReady,

    /// The request body could not be used.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An upstream dependency failed.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// A bug or unexpected state on our side.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::InvalidKey(_) | Self::KeyRevoked => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotEntitled | Self::Expired => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::CodeUnusable => StatusCode::NOT_FOUND,
            Self::CodeExpired => StatusCode::GONE,
            Self::Consumed | Self::NotReady => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable identifier clients branch on.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidKey(_) => "invalid_key",
            Self::KeyRevoked => "key_revoked",
            Self::NotEntitled => "not_entitled",
            Self::Expired => "expired",
            Self::NotFound(_) => "not_found",
            Self::CodeUnusable | Self::CodeExpired => "invalid_or_expired_code",
            Self::Consumed => "consumed_already",
            Self::NotReady => "not_ready",
            Self::BadRequest(_) => "bad_request",
            Self::Upstream(_) => "upstream_unavailable",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!("request error: {}", message);
        } else {
            debug!("request rejected: {}", message);
        }
        let body = ErrorBody {
            error: message,
            kind: self.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<LicenseError> for ApiError {
    fn from(e: LicenseError) -> Self {
        match e {
            LicenseError::NotEntitled => Self::NotEntitled,
            LicenseError::Expired => Self::Expired,
            LicenseError::KeyRevoked => Self::KeyRevoked,
            LicenseError::InvalidFormat(_)
            | LicenseError::InvalidSignature
            | LicenseError::InvalidClaims(_) => Self::InvalidKey(e.to_string()),
            LicenseError::Directory(e) => e.into(),
            LicenseError::Serialization(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::NotFound(id) => Self::NotFound(format!("user {id}")),
            DirectoryError::Network(_) | DirectoryError::BadResponse(_) => {
                Self::Upstream(e.to_string())
            }
            DirectoryError::InvalidWrite(_) | DirectoryError::Serialization(_) => {
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<PairingError> for ApiError {
    fn from(e: PairingError) -> Self {
        match e {
            PairingError::InvalidOrExpiredCode => Self::CodeUnusable,
            PairingError::ConsumedAlready => Self::Consumed,
            PairingError::NotReady => Self::NotReady,
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::MalformedPayload(e) => Self::BadRequest(e.to_string()),
            BillingError::Directory(e) => e.into(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        Self::Upstream(e.to_string())
    }
}
