//! Property-based tests for status normalization and webhook signatures.

use latchkey_billing::{
    map_subscription_status, sign_webhook_payload, verify_webhook_signature,
};
use latchkey_types::EntitlementStatus;
use proptest::prelude::*;

const KNOWN_STATUSES: &[&str] = &[
    "active",
    "trialing",
    "canceled",
    "past_due",
    "unpaid",
    "incomplete",
    "paused",
];

// =============================================================================
// STATUS MAPPING PROPERTIES
// =============================================================================

proptest! {
    /// Every provider status string the table does not know lands on
    /// `past_due`: a new or misspelled provider state restricts access
    /// instead of granting it.
    #[test]
    fn unknown_statuses_restrict(status in "[a-z_]{0,24}") {
        prop_assume!(!KNOWN_STATUSES.contains(&status.as_str()));
        prop_assert_eq!(map_subscription_status(&status), EntitlementStatus::PastDue);
    }

    /// `active` is only ever produced by the two provider states that
    /// actually mean a paid-up subscription.
    #[test]
    fn only_live_states_activate(status in "\\PC{0,32}") {
        let mapped = map_subscription_status(&status);
        let grants = mapped == EntitlementStatus::Active;
        let live = status == "active" || status == "trialing";
        prop_assert_eq!(grants, live);
    }
}

// =============================================================================
// SIGNATURE PROPERTIES
// =============================================================================

proptest! {
    /// Signing and verifying round-trip for any secret, timestamp, and
    /// payload, including payloads with embedded separators.
    #[test]
    fn signed_payloads_verify(
        secret in "[!-~]{1,64}",
        timestamp in 0i64..=4_102_444_800,
        payload in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let header = sign_webhook_payload(&secret, timestamp, &payload);
        prop_assert!(verify_webhook_signature(&secret, &header, &payload));
    }

    /// A different payload never verifies under the original header.
    #[test]
    fn payload_swap_rejected(
        secret in "[!-~]{1,64}",
        timestamp in 0i64..=4_102_444_800,
        payload in prop::collection::vec(any::<u8>(), 1..256),
        other in prop::collection::vec(any::<u8>(), 1..256),
    ) {
        prop_assume!(payload != other);
        // Lossy UTF-8 decoding can collapse distinct byte strings.
        prop_assume!(
            String::from_utf8_lossy(&payload) != String::from_utf8_lossy(&other)
        );
        let header = sign_webhook_payload(&secret, timestamp, &payload);
        prop_assert!(!verify_webhook_signature(&secret, &header, &other));
    }

    /// A header never verifies under a different secret.
    #[test]
    fn foreign_secret_rejected(
        secret in "[!-~]{1,64}",
        other in "[!-~]{1,64}",
        payload in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        prop_assume!(secret != other);
        let header = sign_webhook_payload(&secret, 1_700_000_000, &payload);
        prop_assert!(!verify_webhook_signature(&other, &header, &payload));
    }
}
