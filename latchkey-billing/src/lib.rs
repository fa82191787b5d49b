//! Billing provider integration.
//!
//! The billing provider owns the payment lifecycle and reports it through
//! webhooks. This crate verifies delivery signatures, normalizes the
//! handful of event kinds Latchkey reacts to, and reconciles each one
//! into the entitlement store as a single absolute write, so re-delivery
//! of an event is harmless.

mod error;
mod event;
mod reconciler;
mod signature;

pub use error::{BillingError, BillingResult};
pub use event::{BillingEvent, WebhookData, WebhookEvent, map_subscription_status};
pub use reconciler::Reconciler;
pub use signature::{sign_webhook_payload, verify_webhook_signature};
