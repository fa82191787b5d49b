//! Advisory CLI usage statistics.
//!
//! Updated on every successful assertion mint, displayed in support and
//! oversight tooling, and never consulted for authorization decisions.

use serde::{Deserialize, Serialize};

/// Per-user usage counters for the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// When the last assertion was minted (epoch milliseconds).
    #[serde(default)]
    pub last_assertion_at_ms: i64,
    /// Client software version reported on the last mint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_version: Option<String>,
    /// Total assertions minted for this user. Monotonic.
    #[serde(default)]
    pub assertion_count: u64,
}

impl UsageStats {
    /// Records one assertion mint.
    pub fn record(&mut self, now_ms: i64, client_version: Option<&str>) {
        self.last_assertion_at_ms = now_ms;
        if let Some(version) = client_version {
            self.last_version = Some(version.to_string());
        }
        self.assertion_count += 1;
    }
}
