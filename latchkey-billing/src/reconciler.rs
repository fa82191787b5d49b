//! Turns normalized billing events into entitlement writes.

use crate::error::BillingResult;
use crate::event::{BillingEvent, map_subscription_status};
use latchkey_directory::EntitlementStore;
use latchkey_types::{DEFAULT_PRODUCT, Entitlement, EntitlementPatch, EntitlementPlan, EntitlementStatus};
use tracing::info;

/// Applies billing events to the entitlement store.
///
/// Every branch writes one absolute snapshot of the fields its event is
/// authoritative for, so re-delivery of the same event lands in the same
/// final state. Billing references are only ever added; a canceled or
/// refunded record keeps them for support and audit.
///
/// The provider does not guarantee delivery order. Last write wins here,
/// which means a stale retry arriving after a terminal event can briefly
/// resurrect a dead entitlement until the terminal event is re-delivered.
#[derive(Clone)]
pub struct Reconciler {
    entitlements: EntitlementStore,
}

impl Reconciler {
    pub fn new(entitlements: EntitlementStore) -> Self {
        Self { entitlements }
    }

    /// Applies one event and returns the resulting record.
    pub async fn apply(&self, event: BillingEvent) -> BillingResult<Entitlement> {
        let user_id = event.user_id().clone();
        let patch = match event {
            BillingEvent::CheckoutCompleted {
                plan,
                customer_ref,
                subscription_ref,
                ..
            } => EntitlementPatch {
                status: Some(EntitlementStatus::Active),
                plan: Some(plan),
                product: Some(DEFAULT_PRODUCT.to_string()),
                // A fresh purchase starts open-ended.
                valid_until: Some(None),
                billing_customer_ref: customer_ref,
                billing_subscription_ref: subscription_ref,
                ..Default::default()
            },
            BillingEvent::PaymentSucceeded {
                customer_ref,
                subscription_ref,
                ..
            } => EntitlementPatch {
                status: Some(EntitlementStatus::Active),
                // A successful renewal reopens the subscription and
                // discards any scheduled end.
                valid_until: Some(None),
                billing_customer_ref: customer_ref,
                billing_subscription_ref: subscription_ref,
                ..Default::default()
            },
            BillingEvent::SubscriptionUpdated {
                provider_status,
                cancel_at_period_end,
                period_end,
                customer_ref,
                subscription_ref,
                price_ref,
                ..
            } => EntitlementPatch {
                status: Some(map_subscription_status(&provider_status)),
                plan: Some(EntitlementPlan::Subscription),
                // The scheduled end is authoritative only while a
                // cancellation is pending; resuming clears it.
                valid_until: if cancel_at_period_end {
                    period_end.map(Some)
                } else {
                    Some(None)
                },
                billing_customer_ref: customer_ref,
                billing_subscription_ref: subscription_ref,
                billing_price_ref: price_ref,
                ..Default::default()
            },
            BillingEvent::SubscriptionDeleted {
                customer_ref,
                subscription_ref,
                ..
            } => EntitlementPatch {
                status: Some(EntitlementStatus::Canceled),
                billing_customer_ref: customer_ref,
                billing_subscription_ref: subscription_ref,
                ..Default::default()
            },
            BillingEvent::ChargeRefunded { customer_ref, .. } => EntitlementPatch {
                status: Some(EntitlementStatus::Refunded),
                billing_customer_ref: customer_ref,
                ..Default::default()
            },
        };

        let record = self.entitlements.upsert(&user_id, patch).await?;
        info!(
            user_id = %user_id,
            status = ?record.status,
            "entitlement reconciled"
        );
        Ok(record)
    }
}
