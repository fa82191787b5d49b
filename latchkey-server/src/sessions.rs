//! Browser session verification.
//!
//! Key issuance, revocation, and the browser side of pairing are all
//! authenticated by the site's own session, not by anything this service
//! owns. The one question we need answered is "which user holds this
//! session token"; [`SessionVerifier`] is that seam. The HTTP
//! implementation asks the site's session endpoint, [`MemorySessions`]
//! answers from a fixed map for tests and local development.

use async_trait::async_trait;
use latchkey_types::UserId;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors reaching or understanding the session endpoint.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session endpoint request failed: {0}")]
    Network(String),

    #[error("unexpected session endpoint response: {0}")]
    BadResponse(String),
}

/// Resolves bearer session tokens to users.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// The user a session token belongs to, or `None` when the session
    /// is unknown or no longer valid.
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, SessionError>;
}

/// Configuration for [`HttpSessions`].
#[derive(Debug, Clone)]
pub struct HttpSessionsConfig {
    /// Base URL of the session endpoint.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for HttpSessionsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8900".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Session verifier backed by the site's session endpoint.
///
/// Resolution is `GET {base}/v1/session` with the token as a bearer
/// credential; a success response carries `{user_id}`. Denials (401,
/// 403, 404) mean "no such session", not a failure.
pub struct HttpSessions {
    config: HttpSessionsConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    user_id: UserId,
}

impl HttpSessions {
    #[must_use]
    pub fn new(config: HttpSessionsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to create HTTP client");
        Self { config, client }
    }
}

#[async_trait]
impl SessionVerifier for HttpSessions {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, SessionError> {
        let url = format!("{}/v1/session", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: SessionResponse = response
                .json()
                .await
                .map_err(|e| SessionError::BadResponse(e.to_string()))?;
            return Ok(Some(body.user_id));
        }
        match status.as_u16() {
            401 | 403 | 404 => Ok(None),
            _ => Err(SessionError::BadResponse(format!(
                "session endpoint returned {status}"
            ))),
        }
    }
}

/// Fixed-map session verifier for tests and local development.
#[derive(Debug, Default)]
pub struct MemorySessions {
    sessions: HashMap<String, UserId>,
}

impl MemorySessions {
    /// Creates a verifier that recognizes no sessions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a recognized session token.
    #[must_use]
    pub fn with(mut self, token: impl Into<String>, user_id: UserId) -> Self {
        self.sessions.insert(token.into(), user_id);
        self
    }
}

#[async_trait]
impl SessionVerifier for MemorySessions {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, SessionError> {
        Ok(self.sessions.get(token).cloned())
    }
}
