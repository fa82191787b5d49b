//! Directory client abstraction.
//!
//! Defines the seam between Latchkey and the external profile directory
//! so the service logic works against any backend.

use crate::error::DirectoryResult;
use async_trait::async_trait;
use latchkey_types::UserId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user's profile as seen by this service. The directory holds more
/// (email, display name, auth state); we only ever read and write the
/// metadata document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Open-ended per-user metadata. Latchkey owns only its own keys
    /// inside this map; everything else belongs to other consumers.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A metadata mutation. The closure sees the current metadata document
/// and edits it in place; the directory applies the result under its
/// per-user write serialization.
pub type MetadataUpdate = Box<dyn FnOnce(&mut Map<String, Value>) + Send>;

/// An identity/profile directory.
///
/// Writes are read-modify-write: [`Directory::update_metadata`] runs the
/// given closure against the current document and persists the outcome,
/// serialized per user, so counters held in metadata never lose an
/// increment within this process. Top-level keys the closure does not
/// touch are preserved (merge, not replace).
#[async_trait]
pub trait Directory: Send + Sync {
    /// Fetches a user's profile. Fails with `NotFound` for unknown users.
    async fn get_user(&self, user_id: &UserId) -> DirectoryResult<UserProfile>;

    /// Applies a metadata mutation and returns the updated profile.
    ///
    /// Backends that own their storage create the user entry on first
    /// write; backends fronting a remote directory reject unknown users
    /// with `NotFound`.
    async fn update_metadata(
        &self,
        user_id: &UserId,
        update: MetadataUpdate,
    ) -> DirectoryResult<UserProfile>;
}
