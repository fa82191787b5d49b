//! Device link pairing for the Latchkey CLI.
//!
//! Implements the code-based handshake that moves an API key from an
//! authenticated browser session to a terminal: the CLI starts a link and
//! polls its code, the browser approves it, and the first poll after
//! approval collects the credential. Codes are single-use, short-lived,
//! and unguessable.

mod error;
mod store;

pub use error::{PairingError, PairingResult};
pub use store::{LinkConfig, LinkGrant, LinkRecord, LinkStatus, LinkStore, run_sweeper};
