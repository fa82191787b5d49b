//! Compact token encoding shared by API keys and assertions.
//!
//! Both token kinds use `base64url(claims JSON).base64url(signature)` with
//! unpadded URL-safe base64. Signatures always cover the encoded claims
//! string, never the decoded JSON, so re-serialization differences cannot
//! break verification.

use crate::error::{LicenseError, LicenseResult};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encodes claims into the signable payload half of a token.
pub(crate) fn encode_payload<T: Serialize>(claims: &T) -> LicenseResult<String> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?))
}

/// Joins the payload and raw signature bytes into a token string.
pub(crate) fn join(payload_b64: &str, signature: &[u8]) -> String {
    format!("{payload_b64}.{}", URL_SAFE_NO_PAD.encode(signature))
}

/// Splits a token into its payload and signature halves.
pub(crate) fn split(token: &str) -> LicenseResult<(&str, &str)> {
    let token = token.trim();
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        return Err(LicenseError::InvalidFormat(
            "token must have exactly two parts separated by a dot".to_string(),
        ));
    }
    Ok((parts[0], parts[1]))
}

/// Decodes the signature half into raw bytes.
pub(crate) fn decode_signature(signature_b64: &str) -> LicenseResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|e| LicenseError::InvalidFormat(format!("invalid signature base64: {e}")))
}

/// Decodes the payload half back into claims.
pub(crate) fn decode_payload<T: DeserializeOwned>(payload_b64: &str) -> LicenseResult<T> {
    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|e| LicenseError::InvalidFormat(format!("invalid payload base64: {e}")))?;
    serde_json::from_slice(&payload)
        .map_err(|e| LicenseError::InvalidFormat(format!("invalid claims JSON: {e}")))
}
