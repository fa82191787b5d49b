//! HTTP directory backend.
//!
//! Talks to the hosted profile service over its JSON API:
//!
//! - `GET {base}/v1/users/{id}` returns the profile as `{"metadata": {...}}`
//! - `PATCH {base}/v1/users/{id}/metadata` merges the posted keys into the
//!   stored document (a `null` value deletes the key) and returns the
//!   updated profile
//!
//! Updates are read-modify-write: the closure runs against a snapshot and
//! only the keys it actually changed are sent, so writers touching
//! different keys never clobber each other. Writes to the same user from
//! this process are serialized through a per-user lock.

use crate::client::{Directory, MetadataUpdate, UserProfile};
use crate::error::{DirectoryError, DirectoryResult};
use async_trait::async_trait;
use latchkey_types::UserId;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Configuration for the hosted profile service.
#[derive(Debug, Clone)]
pub struct HttpDirectoryConfig {
    /// Base URL of the profile service (e.g. `https://profiles.example.com`).
    pub base_url: String,
    /// Bearer token for service-to-service auth, if the directory requires one.
    pub api_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpDirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8900".to_string(),
            api_token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// A directory backed by the hosted profile service.
pub struct HttpDirectory {
    config: HttpDirectoryConfig,
    client: Client,
    write_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl HttpDirectory {
    /// Creates a new client for the given profile service.
    #[must_use]
    pub fn new(config: HttpDirectoryConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            config,
            client,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn user_url(&self, user_id: &UserId) -> String {
        format!("{}/v1/users/{}", self.config.base_url, user_id)
    }

    /// Lock guarding writes to one user from this process.
    async fn write_lock(&self, user_id: &UserId) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        locks.entry(user_id.clone()).or_default().clone()
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn fetch_user(&self, user_id: &UserId) -> DirectoryResult<UserProfile> {
        let response = self
            .authorize(self.client.get(self.user_url(user_id)))
            .send()
            .await
            .map_err(|e| DirectoryError::Network(format!("user fetch failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(DirectoryError::NotFound(user_id.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Network(format!(
                "user fetch returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DirectoryError::BadResponse(format!("user profile: {e}")))
    }
}

/// Keys the update changed, with removals encoded as JSON `null`.
fn metadata_diff(before: &Map<String, Value>, after: &Map<String, Value>) -> Map<String, Value> {
    let mut diff = Map::new();
    for (key, value) in after {
        if before.get(key) != Some(value) {
            diff.insert(key.clone(), value.clone());
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            diff.insert(key.clone(), Value::Null);
        }
    }
    diff
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn get_user(&self, user_id: &UserId) -> DirectoryResult<UserProfile> {
        self.fetch_user(user_id).await
    }

    async fn update_metadata(
        &self,
        user_id: &UserId,
        update: MetadataUpdate,
    ) -> DirectoryResult<UserProfile> {
        let lock = self.write_lock(user_id).await;
        let _guard = lock.lock().await;

        let profile = self.fetch_user(user_id).await?;
        let mut updated = profile.metadata.clone();
        update(&mut updated);

        let diff = metadata_diff(&profile.metadata, &updated);
        if diff.is_empty() {
            return Ok(profile);
        }

        debug!(user_id = %user_id, keys = diff.len(), "patching directory metadata");

        let response = self
            .authorize(
                self.client
                    .patch(format!("{}/metadata", self.user_url(user_id)))
                    .json(&diff),
            )
            .send()
            .await
            .map_err(|e| DirectoryError::Network(format!("metadata patch failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(DirectoryError::NotFound(user_id.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Network(format!(
                "metadata patch returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DirectoryError::BadResponse(format!("user profile: {e}")))
    }
}
