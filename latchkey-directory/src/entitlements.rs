//! Entitlement store over the profile directory.

use crate::client::Directory;
use crate::error::{DirectoryError, DirectoryResult};
use latchkey_types::{Entitlement, EntitlementPatch, METADATA_ENTITLEMENT, UserId};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Reads and writes entitlement records stored in directory metadata.
///
/// Missing users and missing records both read as the default record
/// (`status: none`); a corrupt record reads the same way, after a warning,
/// so a bad write restricts access rather than granting it.
#[derive(Clone)]
pub struct EntitlementStore {
    directory: Arc<dyn Directory>,
}

impl EntitlementStore {
    /// Creates a store over the given directory backend.
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// Current entitlement for a user.
    pub async fn get(&self, user_id: &UserId) -> DirectoryResult<Entitlement> {
        match self.directory.get_user(user_id).await {
            Ok(profile) => Ok(read_entitlement(user_id, &profile.metadata)),
            Err(DirectoryError::NotFound(_)) => Ok(Entitlement::default()),
            Err(e) => Err(e),
        }
    }

    /// Applies a patch to the stored record and returns the result.
    ///
    /// The read-modify-write runs inside the directory's per-user update,
    /// so concurrent patches compose instead of clobbering each other.
    pub async fn upsert(
        &self,
        user_id: &UserId,
        patch: EntitlementPatch,
    ) -> DirectoryResult<Entitlement> {
        if patch.product.as_deref() == Some("") {
            return Err(DirectoryError::InvalidWrite(
                "entitlement product must not be empty".to_string(),
            ));
        }

        let target = user_id.clone();
        let profile = self
            .directory
            .update_metadata(
                user_id,
                Box::new(move |metadata| {
                    let mut record = read_entitlement(&target, metadata);
                    record.apply(patch);
                    let value = serde_json::to_value(&record)
                        .expect("entitlement record serializes to JSON");
                    metadata.insert(METADATA_ENTITLEMENT.to_string(), value);
                }),
            )
            .await?;

        Ok(read_entitlement(user_id, &profile.metadata))
    }
}

/// Parses the entitlement record out of a metadata document, tolerating
/// absence and corruption.
fn read_entitlement(user_id: &UserId, metadata: &Map<String, Value>) -> Entitlement {
    match metadata.get(METADATA_ENTITLEMENT) {
        None | Some(Value::Null) => Entitlement::default(),
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(entitlement) => entitlement,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "corrupt entitlement record, treating as absent"
                );
                Entitlement::default()
            }
        },
    }
}
