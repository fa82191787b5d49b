//! Webhook signature verification.
//!
//! The provider signs each delivery with
//! `t=<unix seconds>,v1=<hex hmac>` where the MAC is HMAC-SHA256 over
//! `"{t}.{raw body}"` under the shared endpoint secret. A header may
//! carry several `v1` entries during secret rotation; any one of them
//! verifying is enough.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Checks a delivery's signature header against the raw request body.
#[must_use]
pub fn verify_webhook_signature(secret: &str, header: &str, payload: &[u8]) -> bool {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let mut iter = part.trim().splitn(2, '=');
        let key = iter.next().unwrap_or("");
        let value = iter.next().unwrap_or("");
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };

    let signed_payload = format!("{timestamp}.{}", String::from_utf8_lossy(payload));
    signatures.iter().any(|candidate| {
        let Ok(bytes) = hex::decode(candidate) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signed_payload.as_bytes());
        mac.verify_slice(&bytes).is_ok()
    })
}

/// Produces a signature header for a payload, matching what the
/// provider would send. The counterpart of [`verify_webhook_signature`]
/// for tests and local delivery replay.
#[must_use]
pub fn sign_webhook_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let signed_payload = format!("{timestamp}.{}", String::from_utf8_lossy(payload));
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(signed_payload.as_bytes());
    let tag = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={tag}")
}
