//! API keys and license assertions for the Latchkey CLI.
//!
//! This crate is the credential layer between a user's entitlement record
//! and a running CLI:
//!
//! - **API keys**: long-lived HMAC-tagged bearer tokens obtained through
//!   device pairing, revocable in one step per user
//! - **Assertions**: short-lived Ed25519-signed entitlement snapshots the
//!   CLI fetches per session and may cache across a bounded offline window
//!
//! # Design Principles
//!
//! - **Versioned revocation**: no token lists; every key embeds a per-user
//!   version counter and one bump invalidates everything issued before it
//! - **Fresh entitlement on every mint**: holding a key is not holding a
//!   license; each assertion re-reads the entitlement record
//! - **Two signing domains**: the symmetric API-key secret never leaves the
//!   service, while the assertion keypair's public half is published
//!
//! # Token Format
//!
//! Both token kinds are `base64url(claims).base64url(signature)`, signed
//! over the encoded claims string.

mod assertion;
mod error;
mod keys;
mod token;

pub use assertion::{
    ASSERTION_TTL_SECS, ASSERTION_TYP, Assertion, AssertionClaims, AssertionFreshness,
    AssertionService, MintedAssertion, OFFLINE_GRACE_HOURS,
};
pub use error::{LicenseError, LicenseResult};
pub use keys::{
    API_KEY_TTL_SECS, API_KEY_TYP, ApiKeyClaims, INITIAL_KEY_VERSION, IssuedKey, KEY_SECRET_SIZE,
    KeySecret, KeyService,
};
