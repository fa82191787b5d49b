//! Profile directory client and entitlement store.
//!
//! The identity/profile directory is an external service that owns user
//! records and an open-ended metadata document per user. Latchkey keeps
//! all of its per-user state (entitlement, key version, usage counters)
//! inside that metadata, namespaced under its own keys, so this crate is
//! the only place that talks to the directory.
//!
//! Two implementations of the [`Directory`] trait are provided:
//! - [`MemoryDirectory`] for tests and local development
//! - [`HttpDirectory`] for the hosted profile service

mod client;
mod entitlements;
mod error;
mod http;
mod memory;

pub use client::{Directory, MetadataUpdate, UserProfile};
pub use entitlements::EntitlementStore;
pub use error::{DirectoryError, DirectoryResult};
pub use http::{HttpDirectory, HttpDirectoryConfig};
pub use memory::MemoryDirectory;
