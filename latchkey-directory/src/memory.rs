//! In-memory directory backend.
//!
//! Used by tests and local development. Each update runs under the write
//! lock, which provides the per-user write serialization the trait
//! promises.

use crate::client::{Directory, MetadataUpdate, UserProfile};
use crate::error::{DirectoryError, DirectoryResult};
use async_trait::async_trait;
use latchkey_types::UserId;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A directory backed by a process-local map.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<UserId, UserProfile>>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a profile, replacing any existing one. Test setup helper.
    pub async fn insert(&self, user_id: UserId, profile: UserProfile) {
        self.users.write().await.insert(user_id, profile);
    }

    /// Number of known users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Whether the directory has no users.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn get_user(&self, user_id: &UserId) -> DirectoryResult<UserProfile> {
        self.users
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(user_id.to_string()))
    }

    async fn update_metadata(
        &self,
        user_id: &UserId,
        update: MetadataUpdate,
    ) -> DirectoryResult<UserProfile> {
        let mut users = self.users.write().await;
        let profile = users.entry(user_id.clone()).or_default();
        update(&mut profile.metadata);
        Ok(profile.clone())
    }
}
