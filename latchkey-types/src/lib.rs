//! Core type definitions for Latchkey.
//!
//! This crate defines the domain types shared by every part of the
//! licensing service:
//! - User identifiers (opaque, issued by the external profile directory)
//! - The entitlement record and the patches that mutate it
//! - Advisory CLI usage statistics
//!
//! Service logic (signing, pairing, reconciliation) lives in the crates
//! that own it, not here.

mod entitlement;
mod ids;
mod usage;

pub use entitlement::{
    Entitlement, EntitlementPatch, EntitlementPlan, EntitlementStatus, DEFAULT_PRODUCT,
};
pub use ids::UserId;
pub use usage::UsageStats;

/// Metadata key under which the entitlement record is stored in the
/// directory's per-user metadata.
pub const METADATA_ENTITLEMENT: &str = "entitlement";

/// Metadata key for the monotonic API key version counter.
pub const METADATA_KEY_VERSION: &str = "cli_key_version";

/// Metadata key for advisory CLI usage statistics.
pub const METADATA_USAGE: &str = "cli_usage";
