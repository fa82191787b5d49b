//! In-memory device link store.
//!
//! Pairing hands a long-lived API key from a browser session to a CLI
//! that cannot open one:
//! 1. The CLI calls start and shows the user a short-lived link code
//! 2. The user approves the link in an authenticated browser session,
//!    which attaches the issued key to the record (`ready`)
//! 3. The CLI polls and collects the key exactly once (`completed`)
//!
//! Every transition runs under one mutex, so two pollers racing for a
//! ready record get exactly one winner. Records are never handed out
//! after expiry, and a background sweeper (or an explicit [`LinkStore::sweep`])
//! erases them so grants do not outlive the handshake.

use crate::error::{PairingError, PairingResult};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use latchkey_types::UserId;
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Entropy behind each link code, in bytes.
const LINK_CODE_BYTES: usize = 32;

/// Where a link stands in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Waiting for browser approval.
    Pending,
    /// Approved; credential attached and waiting for one poll.
    Ready,
    /// Credential handed out.
    Completed,
    /// TTL elapsed before the handshake finished.
    Expired,
}

/// The credential a completed approval attaches to a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkGrant {
    /// User who approved the link.
    pub user_id: UserId,
    /// The issued API key.
    pub api_key: String,
    /// Key version embedded in the API key.
    pub version: i64,
}

/// One pairing handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    /// The link code identifying this handshake.
    pub code: String,
    /// Current state.
    pub status: LinkStatus,
    /// Credential, set on approval.
    pub grant: Option<LinkGrant>,
    /// When the handshake started (epoch milliseconds).
    pub created_at_ms: i64,
    /// When the code stops being honored (epoch milliseconds).
    pub expires_at_ms: i64,
    /// When the credential was handed out (epoch milliseconds).
    pub completed_at_ms: Option<i64>,
}

impl LinkRecord {
    fn is_past_expiry(&self, now_ms: i64) -> bool {
        self.status != LinkStatus::Completed && now_ms >= self.expires_at_ms
    }
}

/// Tunables for the link store.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// How long a code is honored.
    pub ttl: Duration,
    /// How long a completed record lingers so duplicate polls get a
    /// conflict answer instead of not-found.
    pub consumed_linger: Duration,
    /// How often the background sweeper runs.
    pub sweep_period: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            consumed_linger: Duration::from_secs(60),
            sweep_period: Duration::from_secs(60),
        }
    }
}

/// Holds all in-flight pairing handshakes.
#[derive(Debug, Default)]
pub struct LinkStore {
    records: Mutex<HashMap<String, LinkRecord>>,
    config: LinkConfig,
}

impl LinkStore {
    /// Creates a store with the given tunables.
    #[must_use]
    pub fn new(config: LinkConfig) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The store's tunables.
    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Starts a handshake: mints a fresh code and a pending record.
    pub async fn start(&self) -> LinkRecord {
        let now_ms = now_ms();
        let record = LinkRecord {
            code: new_link_code(),
            status: LinkStatus::Pending,
            grant: None,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + self.config.ttl.as_millis() as i64,
            completed_at_ms: None,
        };

        let mut records = self.records.lock().await;
        records.insert(record.code.clone(), record.clone());
        debug!(code = %record.code, "started link handshake");
        record
    }

    /// Looks up a record, flipping it to `expired` if its window closed.
    ///
    /// Expiry is observed lazily here and in the transition verbs; the
    /// sweeper only reclaims memory.
    pub async fn get(&self, code: &str) -> Option<LinkRecord> {
        let mut records = self.records.lock().await;
        let record = records.get_mut(code)?;
        if record.is_past_expiry(now_ms()) {
            record.status = LinkStatus::Expired;
        }
        Some(record.clone())
    }

    /// Attaches a credential and marks the link `ready`.
    ///
    /// Idempotent until the credential is handed out: a retried approval
    /// replaces the grant. After consumption it is [`PairingError::ConsumedAlready`].
    pub async fn complete(&self, code: &str, grant: LinkGrant) -> PairingResult<LinkRecord> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(code)
            .ok_or(PairingError::InvalidOrExpiredCode)?;

        if record.is_past_expiry(now_ms()) {
            record.status = LinkStatus::Expired;
        }
        match record.status {
            LinkStatus::Expired => Err(PairingError::InvalidOrExpiredCode),
            LinkStatus::Completed => Err(PairingError::ConsumedAlready),
            LinkStatus::Pending | LinkStatus::Ready => {
                record.grant = Some(grant);
                record.status = LinkStatus::Ready;
                debug!(code = %code, "link approved");
                Ok(record.clone())
            }
        }
    }

    /// Hands out the credential. Exactly one caller ever succeeds.
    ///
    /// The status check and the transition to `completed` share one
    /// critical section, so racing pollers cannot both collect the grant.
    pub async fn consume(&self, code: &str) -> PairingResult<LinkRecord> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(code)
            .ok_or(PairingError::InvalidOrExpiredCode)?;

        let now_ms = now_ms();
        if record.is_past_expiry(now_ms) {
            record.status = LinkStatus::Expired;
        }
        match record.status {
            LinkStatus::Expired => Err(PairingError::InvalidOrExpiredCode),
            LinkStatus::Completed => Err(PairingError::ConsumedAlready),
            LinkStatus::Pending => Err(PairingError::NotReady),
            LinkStatus::Ready => {
                record.status = LinkStatus::Completed;
                record.completed_at_ms = Some(now_ms);
                debug!(code = %code, "link consumed");
                Ok(record.clone())
            }
        }
    }

    /// Deletes records whose window closed and completed records past the
    /// linger. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now_ms = now_ms();
        let linger_ms = self.config.consumed_linger.as_millis() as i64;

        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| match record.status {
            LinkStatus::Completed => {
                record.completed_at_ms.is_none_or(|done| now_ms < done + linger_ms)
            }
            _ => now_ms < record.expires_at_ms,
        });
        before - records.len()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

/// Loops [`LinkStore::sweep`] on the configured period.
pub fn run_sweeper(store: Arc<LinkStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(store.config().sweep_period);
        // The first tick completes immediately; skip it so a fresh store
        // is not swept at startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep().await;
            if removed > 0 {
                debug!(removed, "swept link records");
            }
        }
    })
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Mints an unguessable link code (43 characters of base64url).
fn new_link_code() -> String {
    let mut bytes = [0u8; LINK_CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_codes_are_long_and_unique() {
        let a = new_link_code();
        let b = new_link_code();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&LinkStatus::Pending).unwrap();
        assert_eq!(json, r#""pending""#);
    }
}
