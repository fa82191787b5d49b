mod common;

use common::{api_key_claims_json, forge_api_key, forge_api_key_with, seed_active, test_stack};
use latchkey_directory::Directory;
use latchkey_license::{
    API_KEY_TTL_SECS, API_KEY_TYP, INITIAL_KEY_VERSION, KEY_SECRET_SIZE, KeySecret, LicenseError,
};
use latchkey_types::{EntitlementPatch, EntitlementStatus, METADATA_KEY_VERSION, UserId};
use serde_json::json;

// ── Issue ───────────────────────────────────────────────────────

#[tokio::test]
async fn issue_requires_active_entitlement() {
    let stack = test_stack();
    let user = UserId::new();

    let err = stack.keys.issue(&user).await.unwrap_err();
    assert!(matches!(err, LicenseError::NotEntitled));
}

#[tokio::test]
async fn issue_refuses_canceled_entitlement() {
    let stack = test_stack();
    let user = UserId::new();
    seed_active(&stack, &user).await;
    stack
        .entitlements
        .upsert(
            &user,
            EntitlementPatch {
                status: Some(EntitlementStatus::Canceled),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = stack.keys.issue(&user).await.unwrap_err();
    assert!(matches!(err, LicenseError::NotEntitled));
}

#[tokio::test]
async fn issued_key_verifies_and_carries_claims() {
    let stack = test_stack();
    let user = UserId::new();
    seed_active(&stack, &user).await;

    let issued = stack.keys.issue(&user).await.unwrap();
    assert_eq!(issued.version, INITIAL_KEY_VERSION);

    let claims = stack.keys.verify(&issued.token).unwrap();
    assert_eq!(claims.sub, user);
    assert_eq!(claims.typ, API_KEY_TYP);
    assert_eq!(claims.iss, "latchkey");
    assert_eq!(claims.ver, INITIAL_KEY_VERSION);
    assert_eq!(claims.exp, claims.iat + API_KEY_TTL_SECS);
    assert_eq!(claims.exp, issued.expires_at);
}

#[tokio::test]
async fn issue_does_not_bump_version() {
    let stack = test_stack();
    let user = UserId::new();
    seed_active(&stack, &user).await;

    let first = stack.keys.issue(&user).await.unwrap();
    let second = stack.keys.issue(&user).await.unwrap();
    assert_eq!(first.version, second.version);

    // Both keys remain current.
    let claims = stack.keys.verify(&first.token).unwrap();
    stack.keys.check_current(&claims).await.unwrap();
    let claims = stack.keys.verify(&second.token).unwrap();
    stack.keys.check_current(&claims).await.unwrap();
}

// ── Verify ──────────────────────────────────────────────────────

#[tokio::test]
async fn verify_rejects_malformed_tokens() {
    let stack = test_stack();

    for token in ["", "no-dot-here", "a.b.c", "!!!.###"] {
        let err = stack.keys.verify(token).unwrap_err();
        assert!(
            matches!(err, LicenseError::InvalidFormat(_)),
            "token {token:?} should be rejected as malformed"
        );
    }
}

#[tokio::test]
async fn verify_rejects_tampered_payload() {
    let stack = test_stack();
    let user = UserId::new();
    seed_active(&stack, &user).await;

    let issued = stack.keys.issue(&user).await.unwrap();
    let (payload, tag) = issued.token.split_once('.').unwrap();
    let mut chars: Vec<char> = payload.chars().collect();
    chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();

    let err = stack.keys.verify(&format!("{tampered}.{tag}")).unwrap_err();
    assert!(matches!(err, LicenseError::InvalidSignature));
}

#[tokio::test]
async fn verify_rejects_foreign_secret() {
    let stack = test_stack();
    let user = UserId::new();
    let now = chrono::Utc::now().timestamp();

    let forged = forge_api_key_with(
        &[9u8; 32],
        &api_key_claims_json(&user, 1, now, now + 3600),
    );
    let err = stack.keys.verify(&forged).unwrap_err();
    assert!(matches!(err, LicenseError::InvalidSignature));
}

#[tokio::test]
async fn verify_rejects_wrong_token_type() {
    let stack = test_stack();
    let user = UserId::new();
    let now = chrono::Utc::now().timestamp();

    let payload = format!(
        r#"{{"iss":"latchkey","sub":"{user}","typ":"license_assertion","product":"latchkey-cli","status":"active","offline_grace_hours":72,"ver":1,"iat":{now},"exp":{}}}"#,
        now + 3600
    );
    let err = stack.keys.verify(&forge_api_key(&payload)).unwrap_err();
    assert!(matches!(err, LicenseError::InvalidClaims(_)));
}

#[tokio::test]
async fn verify_rejects_unknown_issuer() {
    let stack = test_stack();
    let user = UserId::new();
    let now = chrono::Utc::now().timestamp();

    let payload = format!(
        r#"{{"iss":"someone-else","sub":"{user}","typ":"cli_api_key","ver":1,"iat":{now},"exp":{}}}"#,
        now + 3600
    );
    let err = stack.keys.verify(&forge_api_key(&payload)).unwrap_err();
    assert!(matches!(err, LicenseError::InvalidClaims(_)));
}

#[tokio::test]
async fn verify_rejects_expired_key() {
    let stack = test_stack();
    let user = UserId::new();
    let now = chrono::Utc::now().timestamp();

    let forged = forge_api_key(&api_key_claims_json(&user, 1, now - 7200, now - 3600));
    let err = stack.keys.verify(&forged).unwrap_err();
    assert!(matches!(err, LicenseError::InvalidClaims(_)));
}

#[tokio::test]
async fn verify_tolerates_surrounding_whitespace() {
    let stack = test_stack();
    let user = UserId::new();
    seed_active(&stack, &user).await;

    let issued = stack.keys.issue(&user).await.unwrap();
    let claims = stack
        .keys
        .verify(&format!("  {}\n", issued.token))
        .unwrap();
    assert_eq!(claims.sub, user);
}

// ── Revocation ──────────────────────────────────────────────────

#[tokio::test]
async fn version_reads_as_one_for_fresh_users() {
    let stack = test_stack();
    let user = UserId::new();
    assert_eq!(
        stack.keys.current_version(&user).await.unwrap(),
        INITIAL_KEY_VERSION
    );
}

#[tokio::test]
async fn revoke_invalidates_issued_keys() {
    let stack = test_stack();
    let user = UserId::new();
    seed_active(&stack, &user).await;

    let issued = stack.keys.issue(&user).await.unwrap();
    let claims = stack.keys.verify(&issued.token).unwrap();
    stack.keys.check_current(&claims).await.unwrap();

    let new_version = stack.keys.revoke(&user).await.unwrap();
    assert_eq!(new_version, issued.version + 1);

    // The old key still passes pure verification but is no longer current.
    let claims = stack.keys.verify(&issued.token).unwrap();
    let err = stack.keys.check_current(&claims).await.unwrap_err();
    assert!(matches!(err, LicenseError::KeyRevoked));
}

#[tokio::test]
async fn reissue_after_revoke_is_current() {
    let stack = test_stack();
    let user = UserId::new();
    seed_active(&stack, &user).await;

    let old = stack.keys.issue(&user).await.unwrap();
    stack.keys.revoke(&user).await.unwrap();
    let fresh = stack.keys.issue(&user).await.unwrap();
    assert_eq!(fresh.version, old.version + 1);

    let claims = stack.keys.verify(&fresh.token).unwrap();
    stack.keys.check_current(&claims).await.unwrap();
}

#[tokio::test]
async fn concurrent_revokes_both_count() {
    let stack = test_stack();
    let user = UserId::new();

    stack
        .directory
        .update_metadata(
            &user,
            Box::new(|metadata| {
                metadata.insert(METADATA_KEY_VERSION.to_string(), json!(3));
            }),
        )
        .await
        .unwrap();

    let (a, b) = tokio::join!(stack.keys.revoke(&user), stack.keys.revoke(&user));
    let (a, b) = (a.unwrap(), b.unwrap());

    // One bump lands on 4, the other on 5; neither is lost.
    assert_ne!(a, b);
    assert_eq!(a.max(b), 5);
    assert_eq!(stack.keys.current_version(&user).await.unwrap(), 5);
}

#[tokio::test]
async fn revoke_leaves_other_metadata_alone() {
    let stack = test_stack();
    let user = UserId::new();
    seed_active(&stack, &user).await;

    stack.keys.revoke(&user).await.unwrap();

    let entitlement = stack.entitlements.get(&user).await.unwrap();
    assert!(entitlement.is_active());
}

#[tokio::test]
async fn malformed_version_reads_as_initial() {
    let stack = test_stack();
    let user = UserId::new();

    stack
        .directory
        .update_metadata(
            &user,
            Box::new(|metadata| {
                metadata.insert(METADATA_KEY_VERSION.to_string(), json!("three"));
            }),
        )
        .await
        .unwrap();

    assert_eq!(
        stack.keys.current_version(&user).await.unwrap(),
        INITIAL_KEY_VERSION
    );
    // Revoking from a malformed counter restarts the sequence.
    assert_eq!(stack.keys.revoke(&user).await.unwrap(), 2);
}

// ── KeySecret ───────────────────────────────────────────────────

#[test]
fn secret_base64_roundtrip() {
    use base64::{Engine, engine::general_purpose::STANDARD};

    let encoded = STANDARD.encode([5u8; KEY_SECRET_SIZE]);
    KeySecret::from_base64(&encoded).unwrap();
    KeySecret::from_base64(&format!("  {encoded}\n")).unwrap();
}

#[test]
fn secret_rejects_wrong_length() {
    use base64::{Engine, engine::general_purpose::STANDARD};

    let short = STANDARD.encode([5u8; 16]);
    assert!(matches!(
        KeySecret::from_base64(&short),
        Err(LicenseError::InvalidFormat(_))
    ));
    assert!(matches!(
        KeySecret::from_base64("not base64!!!"),
        Err(LicenseError::InvalidFormat(_))
    ));
}

#[test]
fn secret_debug_is_redacted() {
    let secret = KeySecret::from_bytes([5u8; KEY_SECRET_SIZE]);
    let debug = format!("{secret:?}");
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains('5'));
}

// ── Cross-secret isolation ──────────────────────────────────────

#[tokio::test]
async fn keys_do_not_verify_across_services() {
    use latchkey_directory::MemoryDirectory;
    use latchkey_license::KeyService;
    use std::sync::Arc;

    let stack = test_stack();
    let user = UserId::new();
    seed_active(&stack, &user).await;
    let issued = stack.keys.issue(&user).await.unwrap();

    let other = KeyService::new(
        Arc::new(MemoryDirectory::new()),
        KeySecret::from_bytes([99u8; KEY_SECRET_SIZE]),
        "latchkey",
    );
    let err = other.verify(&issued.token).unwrap_err();
    assert!(matches!(err, LicenseError::InvalidSignature));
}
