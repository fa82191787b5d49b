//! Provider webhook payloads and their normalized form.
//!
//! The billing provider delivers a thin envelope (`{type, data.object}`)
//! whose object shape varies by event kind. [`WebhookEvent`] deserializes
//! the envelope, [`BillingEvent::from_webhook`] lifts the kinds this
//! service reacts to into a typed enum, and everything else is dropped.
//!
//! Attribution: every payload object this service acts on must carry the
//! purchasing user's directory ID under `metadata.user_id` (the checkout
//! flow plants it there). Events without it cannot be tied to an
//! entitlement and are dropped with a warning.

use crate::error::BillingResult;
use latchkey_types::{EntitlementPlan, EntitlementStatus, UserId};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

/// Raw webhook envelope as delivered by the billing provider.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// Provider event kind, e.g. `customer.subscription.updated`.
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

/// The `data` wrapper around the event's subject object.
#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: Value,
}

impl WebhookEvent {
    /// Parses a raw webhook body.
    pub fn parse(payload: &[u8]) -> BillingResult<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// A billing lifecycle event normalized down to the fields this service
/// acts on. Each variant carries the authoritative state for its kind;
/// the reconciler turns it into one absolute entitlement write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    /// A checkout session finished; the purchase is live.
    CheckoutCompleted {
        user_id: UserId,
        plan: EntitlementPlan,
        customer_ref: Option<String>,
        subscription_ref: Option<String>,
    },
    /// A recurring invoice was paid; the subscription is current.
    PaymentSucceeded {
        user_id: UserId,
        customer_ref: Option<String>,
        subscription_ref: Option<String>,
    },
    /// The subscription changed state at the provider.
    SubscriptionUpdated {
        user_id: UserId,
        provider_status: String,
        cancel_at_period_end: bool,
        period_end: Option<i64>,
        customer_ref: Option<String>,
        subscription_ref: Option<String>,
        price_ref: Option<String>,
    },
    /// The subscription ended.
    SubscriptionDeleted {
        user_id: UserId,
        customer_ref: Option<String>,
        subscription_ref: Option<String>,
    },
    /// A charge was refunded.
    ChargeRefunded {
        user_id: UserId,
        customer_ref: Option<String>,
    },
}

impl BillingEvent {
    /// Normalizes a provider envelope, or `None` if the event is not one
    /// this service reacts to (unhandled kind, or no user attribution).
    pub fn from_webhook(event: &WebhookEvent) -> Option<Self> {
        let object = &event.data.object;
        match event.kind.as_str() {
            "checkout.session.completed" => {
                let user_id = attributed_user(&event.kind, object)?;
                // One-time payments are lifetime purchases; everything
                // else runs through a subscription.
                let plan = if get_str(object, "mode").as_deref() == Some("payment") {
                    EntitlementPlan::Lifetime
                } else {
                    EntitlementPlan::Subscription
                };
                Some(Self::CheckoutCompleted {
                    user_id,
                    plan,
                    customer_ref: get_str(object, "customer"),
                    subscription_ref: get_str(object, "subscription"),
                })
            }
            "invoice.paid" => {
                let user_id = attributed_user(&event.kind, object)?;
                Some(Self::PaymentSucceeded {
                    user_id,
                    customer_ref: get_str(object, "customer"),
                    subscription_ref: get_str(object, "subscription"),
                })
            }
            "customer.subscription.updated" => {
                let user_id = attributed_user(&event.kind, object)?;
                Some(Self::SubscriptionUpdated {
                    user_id,
                    provider_status: get_str(object, "status").unwrap_or_default(),
                    cancel_at_period_end: object
                        .get("cancel_at_period_end")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    period_end: object.get("current_period_end").and_then(Value::as_i64),
                    customer_ref: get_str(object, "customer"),
                    subscription_ref: get_str(object, "id"),
                    price_ref: object
                        .get("items")
                        .and_then(|v| v.get("data"))
                        .and_then(|v| v.get(0))
                        .and_then(|v| v.get("price"))
                        .and_then(|v| v.get("id"))
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                })
            }
            "customer.subscription.deleted" => {
                let user_id = attributed_user(&event.kind, object)?;
                Some(Self::SubscriptionDeleted {
                    user_id,
                    customer_ref: get_str(object, "customer"),
                    subscription_ref: get_str(object, "id"),
                })
            }
            "charge.refunded" => {
                let user_id = attributed_user(&event.kind, object)?;
                Some(Self::ChargeRefunded {
                    user_id,
                    customer_ref: get_str(object, "customer"),
                })
            }
            other => {
                info!(kind = other, "ignored billing event");
                None
            }
        }
    }

    /// The user this event belongs to.
    pub fn user_id(&self) -> &UserId {
        match self {
            Self::CheckoutCompleted { user_id, .. }
            | Self::PaymentSucceeded { user_id, .. }
            | Self::SubscriptionUpdated { user_id, .. }
            | Self::SubscriptionDeleted { user_id, .. }
            | Self::ChargeRefunded { user_id, .. } => user_id,
        }
    }
}

/// Maps a provider subscription status string onto the entitlement
/// status enum. Unrecognized states restrict access rather than grant it.
pub fn map_subscription_status(provider: &str) -> EntitlementStatus {
    match provider {
        "active" | "trialing" => EntitlementStatus::Active,
        "canceled" => EntitlementStatus::Canceled,
        "past_due" | "unpaid" | "incomplete" | "paused" => EntitlementStatus::PastDue,
        other => {
            warn!(status = other, "unrecognized subscription status, restricting access");
            EntitlementStatus::PastDue
        }
    }
}

/// Pulls `metadata.user_id` out of a payload object, warning when the
/// event cannot be attributed.
fn attributed_user(kind: &str, object: &Value) -> Option<UserId> {
    let id = object
        .get("metadata")
        .and_then(|v| v.get("user_id"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty());
    match id {
        Some(id) => Some(UserId::from(id)),
        None => {
            warn!(kind, "billing event without metadata.user_id, dropping");
            None
        }
    }
}

fn get_str(object: &Value, key: &str) -> Option<String> {
    object.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}
