//! The entitlement record — the authoritative statement of what a user is
//! allowed to do with the product.
//!
//! One record per user, stored in the profile directory's metadata and
//! mutated only through billing reconciliation or explicit admin actions.
//! Writers send complete snapshots of the fields they intend to change;
//! the record itself carries no history.

use serde::{Deserialize, Serialize};

/// The single product this service licenses today.
pub const DEFAULT_PRODUCT: &str = "latchkey-cli";

/// Entitlement status, aligned with the billing provider's lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    /// Never purchased (or record absent).
    #[default]
    None,
    /// Paid up; the only status that permits key issuance.
    Active,
    /// Payment failed; access restricted until the provider recovers it.
    PastDue,
    /// Subscription ended.
    Canceled,
    /// Purchase refunded.
    Refunded,
}

impl EntitlementStatus {
    /// Returns true if this status permits issuing credentials.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// How the user purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementPlan {
    /// One-time purchase, never expires.
    Lifetime,
    /// Recurring subscription.
    Subscription,
}

/// A user's entitlement record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Current status; defaults to `none` for users with no record.
    #[serde(default)]
    pub status: EntitlementStatus,
    /// Purchase plan; unset until first purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<EntitlementPlan>,
    /// Product identifier the entitlement covers.
    #[serde(default = "default_product")]
    pub product: String,
    /// Expiry in epoch seconds; `None` means no fixed expiry
    /// (lifetime purchase or an open subscription).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<i64>,
    /// Opaque billing provider customer reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_customer_ref: Option<String>,
    /// Opaque billing provider subscription reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_subscription_ref: Option<String>,
    /// Opaque billing provider price reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_price_ref: Option<String>,
}

fn default_product() -> String {
    DEFAULT_PRODUCT.to_string()
}

impl Default for Entitlement {
    fn default() -> Self {
        Self {
            status: EntitlementStatus::None,
            plan: None,
            product: default_product(),
            valid_until: None,
            billing_customer_ref: None,
            billing_subscription_ref: None,
            billing_price_ref: None,
        }
    }
}

impl Entitlement {
    /// Returns true if the status permits issuing credentials.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Returns true if a fixed expiry is set and has passed.
    #[must_use]
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.valid_until.is_some_and(|until| now_secs > until)
    }

    /// Applies a patch field-wise. Unset patch fields leave the record
    /// untouched, so billing references are only ever added — a canceled
    /// subscription keeps its refs for support and audit.
    pub fn apply(&mut self, patch: EntitlementPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(plan) = patch.plan {
            self.plan = Some(plan);
        }
        if let Some(product) = patch.product {
            self.product = product;
        }
        if let Some(valid_until) = patch.valid_until {
            self.valid_until = valid_until;
        }
        if let Some(customer) = patch.billing_customer_ref {
            self.billing_customer_ref = Some(customer);
        }
        if let Some(subscription) = patch.billing_subscription_ref {
            self.billing_subscription_ref = Some(subscription);
        }
        if let Some(price) = patch.billing_price_ref {
            self.billing_price_ref = Some(price);
        }
    }
}

/// A partial entitlement write. Each event handler fills in the complete,
/// authoritative snapshot of the fields it owns and leaves the rest unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitlementPatch {
    pub status: Option<EntitlementStatus>,
    pub plan: Option<EntitlementPlan>,
    pub product: Option<String>,
    /// `Some(None)` clears a previously set expiry.
    pub valid_until: Option<Option<i64>>,
    pub billing_customer_ref: Option<String>,
    pub billing_subscription_ref: Option<String>,
    pub billing_price_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_none_with_default_product() {
        let e = Entitlement::default();
        assert_eq!(e.status, EntitlementStatus::None);
        assert_eq!(e.product, DEFAULT_PRODUCT);
        assert!(e.plan.is_none());
    }

    #[test]
    fn patch_does_not_clear_billing_refs() {
        let mut e = Entitlement {
            status: EntitlementStatus::Active,
            plan: Some(EntitlementPlan::Subscription),
            billing_customer_ref: Some("cus_1".into()),
            billing_subscription_ref: Some("sub_1".into()),
            ..Default::default()
        };
        e.apply(EntitlementPatch {
            status: Some(EntitlementStatus::Canceled),
            ..Default::default()
        });
        assert_eq!(e.status, EntitlementStatus::Canceled);
        assert_eq!(e.billing_customer_ref.as_deref(), Some("cus_1"));
        assert_eq!(e.billing_subscription_ref.as_deref(), Some("sub_1"));
    }

    #[test]
    fn patch_can_clear_expiry() {
        let mut e = Entitlement {
            valid_until: Some(1_700_000_000),
            ..Default::default()
        };
        e.apply(EntitlementPatch {
            valid_until: Some(None),
            ..Default::default()
        });
        assert_eq!(e.valid_until, None);
    }

    #[test]
    fn expiry_check() {
        let e = Entitlement {
            valid_until: Some(1_000),
            ..Default::default()
        };
        assert!(!e.is_expired_at(999));
        assert!(!e.is_expired_at(1_000));
        assert!(e.is_expired_at(1_001));

        let open = Entitlement::default();
        assert!(!open.is_expired_at(i64::MAX));
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&EntitlementStatus::PastDue).unwrap();
        assert_eq!(json, r#""past_due""#);
        let parsed: EntitlementStatus = serde_json::from_str(r#""refunded""#).unwrap();
        assert_eq!(parsed, EntitlementStatus::Refunded);
    }

    #[test]
    fn partial_metadata_json_parses() {
        // Records written by older releases may carry only a status.
        let e: Entitlement = serde_json::from_str(r#"{"status":"active"}"#).unwrap();
        assert_eq!(e.status, EntitlementStatus::Active);
        assert_eq!(e.product, DEFAULT_PRODUCT);
        assert_eq!(e.valid_until, None);
    }
}
