//! HTTP surface of the Latchkey licensing service.
//!
//! This crate wires the licensing, pairing, and billing crates into one
//! axum application: session-authenticated key management for the
//! browser, API-key-authenticated assertion minting for the CLI, the
//! public pairing handshake between the two, and the billing webhook
//! that keeps entitlements current.

mod config;
mod error;
mod routes;
mod sessions;
mod state;

pub use config::{DEFAULT_ISSUER, DEFAULT_LINK_TTL, ServerConfig};
pub use error::{ApiError, ErrorBody};
pub use routes::{
    IssueKeyResponse, LinkCompleteRequest, LinkCompleteResponse, LinkPollResponse,
    LinkStartResponse, MintAssertionRequest, MintAssertionResponse, PublicKeyResponse,
    RevokeKeyResponse, WEBHOOK_SIGNATURE_HEADER, build_router,
};
pub use sessions::{
    HttpSessions, HttpSessionsConfig, MemorySessions, SessionError, SessionVerifier,
};
pub use state::AppState;
