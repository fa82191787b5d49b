//! Shared test helpers for license tests.

#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use latchkey_directory::{EntitlementStore, MemoryDirectory};
use latchkey_license::{AssertionService, KeySecret, KeyService};
use latchkey_types::{EntitlementPatch, EntitlementPlan, EntitlementStatus, UserId};
use sha2::Sha256;
use std::sync::Arc;

pub const TEST_ISSUER: &str = "latchkey";

pub const TEST_SECRET: [u8; 32] = [
    40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62,
    63, 64, 65, 66, 67, 68, 69, 70, 71,
];

/// Returns a deterministic Ed25519 signing key from a fixed seed.
pub fn test_signing_key() -> SigningKey {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    SigningKey::from_bytes(&seed)
}

/// The full service stack over one in-memory directory.
pub struct TestStack {
    pub directory: Arc<MemoryDirectory>,
    pub entitlements: EntitlementStore,
    pub keys: Arc<KeyService>,
    pub assertions: AssertionService,
}

pub fn test_stack() -> TestStack {
    let directory = Arc::new(MemoryDirectory::new());
    let entitlements = EntitlementStore::new(directory.clone());
    let keys = Arc::new(KeyService::new(
        directory.clone(),
        KeySecret::from_bytes(TEST_SECRET),
        TEST_ISSUER,
    ));
    let assertions = AssertionService::new(keys.clone(), directory.clone(), test_signing_key());
    TestStack {
        directory,
        entitlements,
        keys,
        assertions,
    }
}

/// Gives a user an active lifetime entitlement.
pub async fn seed_active(stack: &TestStack, user_id: &UserId) {
    stack
        .entitlements
        .upsert(
            user_id,
            EntitlementPatch {
                status: Some(EntitlementStatus::Active),
                plan: Some(EntitlementPlan::Lifetime),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

/// Builds an API key token from raw claims JSON, tagged with `secret`.
pub fn forge_api_key_with(secret: &[u8], payload_json: &str) -> String {
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
    mac.update(payload_b64.as_bytes());
    let tag = mac.finalize().into_bytes();
    format!("{payload_b64}.{}", URL_SAFE_NO_PAD.encode(tag))
}

/// Builds an API key token tagged with the stack's secret.
pub fn forge_api_key(payload_json: &str) -> String {
    forge_api_key_with(&TEST_SECRET, payload_json)
}

/// API key claims JSON with the test issuer.
pub fn api_key_claims_json(user_id: &UserId, ver: i64, iat: i64, exp: i64) -> String {
    format!(
        r#"{{"iss":"{TEST_ISSUER}","sub":"{user_id}","typ":"cli_api_key","ver":{ver},"iat":{iat},"exp":{exp}}}"#
    )
}

/// Builds an assertion token signed over the encoded payload bytes.
pub fn sign_assertion(signing_key: &SigningKey, payload_json: &str) -> String {
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
    let signature = signing_key.sign(payload_b64.as_bytes());
    format!(
        "{payload_b64}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    )
}

/// Assertion claims JSON with the given expiry window.
pub fn assertion_claims_json(user_id: &UserId, iat: i64, exp: i64, grace_hours: i64) -> String {
    format!(
        r#"{{"iss":"{TEST_ISSUER}","sub":"{user_id}","typ":"license_assertion","product":"latchkey-cli","plan":"lifetime","status":"active","offline_grace_hours":{grace_hours},"iat":{iat},"exp":{exp}}}"#
    )
}
