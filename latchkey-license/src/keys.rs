//! API key issuance, verification, and revocation.
//!
//! API keys are long-lived bearer credentials the CLI stores after device
//! pairing, in the format `base64url(claims).base64url(tag)` where the tag
//! is HMAC-SHA256 over the encoded claims string. Claims:
//!
//! - `iss`: issuing service name
//! - `sub`: user ID
//! - `typ`: always `cli_api_key`
//! - `ver`: the user's key version at issue time
//! - `iat` / `exp`: issue and expiry timestamps (seconds since epoch)
//!
//! Revocation is versioned rather than list-based: every key embeds the
//! user's key version and bumping the version invalidates all keys issued
//! before the bump. [`KeyService::verify`] is deliberately pure (no
//! directory read); callers that need revocation enforcement follow it
//! with [`KeyService::check_current`].

use crate::error::{LicenseError, LicenseResult};
use crate::token;
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use latchkey_directory::{Directory, DirectoryError, EntitlementStore};
use latchkey_types::{METADATA_KEY_VERSION, UserId};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use std::sync::Arc;
use tracing::info;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// API key lifetime in seconds (365 days).
pub const API_KEY_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// `typ` claim value for API keys.
pub const API_KEY_TYP: &str = "cli_api_key";

/// Key version for users that have never revoked.
pub const INITIAL_KEY_VERSION: i64 = 1;

/// Size of the API key signing secret in bytes.
pub const KEY_SECRET_SIZE: usize = 32;

/// HMAC secret for API key tags, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeySecret {
    bytes: [u8; KEY_SECRET_SIZE],
}

impl KeySecret {
    /// Generates a fresh random secret.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SECRET_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a secret from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SECRET_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parses a secret from standard base64, the encoding used for
    /// key material in configuration.
    pub fn from_base64(encoded: &str) -> LicenseResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| LicenseError::InvalidFormat(format!("invalid secret base64: {e}")))?;
        let bytes: [u8; KEY_SECRET_SIZE] = bytes.try_into().map_err(|_| {
            LicenseError::InvalidFormat(format!("secret must be {KEY_SECRET_SIZE} bytes"))
        })?;
        Ok(Self { bytes })
    }

    fn as_bytes(&self) -> &[u8; KEY_SECRET_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for KeySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Claims carried in an API key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyClaims {
    /// Issuing service name.
    pub iss: String,
    /// User the key belongs to.
    pub sub: UserId,
    /// Token type, always [`API_KEY_TYP`].
    pub typ: String,
    /// User's key version at issue time.
    pub ver: i64,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiry timestamp (seconds since epoch).
    pub exp: i64,
}

/// A freshly issued API key.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedKey {
    /// The bearer token to hand to the client.
    pub token: String,
    /// Key version embedded in the token.
    pub version: i64,
    /// Expiry timestamp (seconds since epoch).
    pub expires_at: i64,
}

/// Issues, verifies, and revokes API keys for one issuer.
pub struct KeyService {
    directory: Arc<dyn Directory>,
    entitlements: EntitlementStore,
    secret: KeySecret,
    issuer: String,
}

impl KeyService {
    /// Creates a service signing with the given secret.
    pub fn new(directory: Arc<dyn Directory>, secret: KeySecret, issuer: impl Into<String>) -> Self {
        let entitlements = EntitlementStore::new(directory.clone());
        Self {
            directory,
            entitlements,
            secret,
            issuer: issuer.into(),
        }
    }

    /// The issuer name stamped into every token.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issues a new API key for a user with an active entitlement.
    ///
    /// The key embeds the user's current key version. Issuing never bumps
    /// the version, so existing keys stay valid.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::NotEntitled`] unless the user's entitlement
    /// status is `active`.
    pub async fn issue(&self, user_id: &UserId) -> LicenseResult<IssuedKey> {
        let entitlement = self.entitlements.get(user_id).await?;
        if !entitlement.is_active() {
            return Err(LicenseError::NotEntitled);
        }

        let version = self.current_version(user_id).await?;
        let now = chrono::Utc::now().timestamp();
        let claims = ApiKeyClaims {
            iss: self.issuer.clone(),
            sub: user_id.clone(),
            typ: API_KEY_TYP.to_string(),
            ver: version,
            iat: now,
            exp: now + API_KEY_TTL_SECS,
        };

        let payload_b64 = token::encode_payload(&claims)?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload_b64.as_bytes());
        let tag = mac.finalize().into_bytes();

        info!(user_id = %user_id, version, "issued api key");
        Ok(IssuedKey {
            token: token::join(&payload_b64, tag.as_slice()),
            version,
            expires_at: claims.exp,
        })
    }

    /// Verifies a token's tag and claims, returning the decoded claims.
    ///
    /// This check is pure: it proves the token was minted by this service
    /// and is not past its own expiry, nothing more. Revocation is a
    /// separate, explicit [`check_current`](Self::check_current) so callers
    /// choose when to pay for the directory read.
    pub fn verify(&self, key: &str) -> LicenseResult<ApiKeyClaims> {
        let (payload_b64, tag_b64) = token::split(key)?;
        let tag = token::decode_signature(tag_b64)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&tag)
            .map_err(|_| LicenseError::InvalidSignature)?;

        let claims: ApiKeyClaims = token::decode_payload(payload_b64)?;
        if claims.typ != API_KEY_TYP {
            return Err(LicenseError::InvalidClaims(format!(
                "unexpected token type {:?}",
                claims.typ
            )));
        }
        if claims.iss != self.issuer {
            return Err(LicenseError::InvalidClaims(format!(
                "unknown issuer {:?}",
                claims.iss
            )));
        }
        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(LicenseError::InvalidClaims("key expired".to_string()));
        }

        Ok(claims)
    }

    /// Confirms the key's embedded version is still the user's current one.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyRevoked`] on any mismatch.
    pub async fn check_current(&self, claims: &ApiKeyClaims) -> LicenseResult<()> {
        let current = self.current_version(&claims.sub).await?;
        if claims.ver != current {
            return Err(LicenseError::KeyRevoked);
        }
        Ok(())
    }

    /// The user's current key version. Users that never revoked read as
    /// [`INITIAL_KEY_VERSION`].
    pub async fn current_version(&self, user_id: &UserId) -> LicenseResult<i64> {
        match self.directory.get_user(user_id).await {
            Ok(profile) => Ok(read_key_version(&profile.metadata)),
            Err(DirectoryError::NotFound(_)) => Ok(INITIAL_KEY_VERSION),
            Err(e) => Err(e.into()),
        }
    }

    /// Revokes all of a user's keys by bumping the version counter.
    ///
    /// The increment runs inside the directory update, so concurrent
    /// revocations each get their own bump and none is lost. Returns the
    /// new version.
    pub async fn revoke(&self, user_id: &UserId) -> LicenseResult<i64> {
        let profile = self
            .directory
            .update_metadata(
                user_id,
                Box::new(|metadata| {
                    let next = read_key_version(metadata) + 1;
                    metadata.insert(METADATA_KEY_VERSION.to_string(), next.into());
                }),
            )
            .await?;

        let version = read_key_version(&profile.metadata);
        info!(user_id = %user_id, version, "revoked api keys");
        Ok(version)
    }
}

/// Reads the key version out of a metadata document; absent or malformed
/// reads as the initial version.
fn read_key_version(metadata: &Map<String, Value>) -> i64 {
    metadata
        .get(METADATA_KEY_VERSION)
        .and_then(Value::as_i64)
        .unwrap_or(INITIAL_KEY_VERSION)
}
