//! License assertion minting and offline verification.
//!
//! An assertion is a short-lived Ed25519-signed statement of entitlement
//! the CLI fetches at the start of a session and caches. It is signed with
//! a dedicated keypair, never the API-key secret, so the public half can
//! be published for offline validation without exposing anything that
//! mints credentials.
//!
//! Format: `base64url(claims).base64url(signature)`, signature over the
//! encoded claims string. Claims:
//!
//! - `iss`, `sub`, `iat`, `exp`: as for API keys, with `exp = iat + 24h`
//! - `typ`: always `license_assertion`
//! - `product`, `plan`, `status`: the entitlement snapshot at mint time
//! - `offline_grace_hours`: how long past `exp` a cached assertion may
//!   still be honored by an offline client

use crate::error::{LicenseError, LicenseResult};
use crate::keys::KeyService;
use crate::token;
use base64::{Engine, engine::general_purpose::STANDARD};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use latchkey_directory::{Directory, EntitlementStore};
use latchkey_types::{
    DEFAULT_PRODUCT, EntitlementPlan, EntitlementStatus, METADATA_USAGE, UsageStats, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Assertion lifetime in seconds (24 hours).
pub const ASSERTION_TTL_SECS: i64 = 24 * 60 * 60;

/// How long past expiry an offline client may keep honoring an assertion.
pub const OFFLINE_GRACE_HOURS: i64 = 72;

/// `typ` claim value for assertions.
pub const ASSERTION_TYP: &str = "license_assertion";

/// Claims carried in a license assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuing service name.
    pub iss: String,
    /// User the assertion covers.
    pub sub: UserId,
    /// Token type, always [`ASSERTION_TYP`].
    pub typ: String,
    /// Product the entitlement covers.
    pub product: String,
    /// Purchase plan, when one is recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<EntitlementPlan>,
    /// Entitlement status at mint time.
    pub status: EntitlementStatus,
    /// Offline grace window in hours.
    pub offline_grace_hours: i64,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiry timestamp (seconds since epoch).
    pub exp: i64,
}

/// A freshly minted assertion.
#[derive(Debug, Clone, Serialize)]
pub struct MintedAssertion {
    /// The signed assertion token.
    pub assertion: String,
    /// Seconds until the assertion expires.
    pub expires_in_secs: i64,
}

/// Mints assertions for holders of valid API keys.
pub struct AssertionService {
    keys: Arc<KeyService>,
    entitlements: EntitlementStore,
    directory: Arc<dyn Directory>,
    signing_key: SigningKey,
}

impl AssertionService {
    /// Creates a service signing with the given Ed25519 key.
    pub fn new(keys: Arc<KeyService>, directory: Arc<dyn Directory>, signing_key: SigningKey) -> Self {
        let entitlements = EntitlementStore::new(directory.clone());
        Self {
            keys,
            entitlements,
            directory,
            signing_key,
        }
    }

    /// The verifying half of the assertion keypair.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The verifying key in standard base64, for the publication endpoint.
    #[must_use]
    pub fn public_key_b64(&self) -> String {
        STANDARD.encode(self.verifying_key().to_bytes())
    }

    /// Mints an assertion for the holder of `api_key`.
    ///
    /// The full pipeline runs on every call: key verification, revocation
    /// currency, then a fresh entitlement read. A key that verified
    /// yesterday buys nothing today if the entitlement lapsed in between.
    ///
    /// # Errors
    ///
    /// - [`LicenseError::InvalidFormat`] / [`LicenseError::InvalidSignature`] /
    ///   [`LicenseError::InvalidClaims`] for a bad key
    /// - [`LicenseError::KeyRevoked`] when the key's version is stale
    /// - [`LicenseError::NotEntitled`] when the entitlement is not active
    ///   or covers a different product
    /// - [`LicenseError::Expired`] when the entitlement's window has passed
    pub async fn mint(
        &self,
        api_key: &str,
        product: Option<&str>,
        client_version: Option<&str>,
    ) -> LicenseResult<MintedAssertion> {
        let key_claims = self.keys.verify(api_key)?;
        self.keys.check_current(&key_claims).await?;
        let user_id = key_claims.sub;

        let entitlement = self.entitlements.get(&user_id).await?;
        if !entitlement.is_active() {
            return Err(LicenseError::NotEntitled);
        }
        let product = product.unwrap_or(DEFAULT_PRODUCT);
        if entitlement.product != product {
            return Err(LicenseError::NotEntitled);
        }
        let now = chrono::Utc::now().timestamp();
        if entitlement.is_expired_at(now) {
            return Err(LicenseError::Expired);
        }

        self.record_usage(&user_id, client_version).await;

        let claims = AssertionClaims {
            iss: self.keys.issuer().to_string(),
            sub: user_id.clone(),
            typ: ASSERTION_TYP.to_string(),
            product: entitlement.product.clone(),
            plan: entitlement.plan,
            status: entitlement.status,
            offline_grace_hours: OFFLINE_GRACE_HOURS,
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };

        let payload_b64 = token::encode_payload(&claims)?;
        let signature = self.signing_key.sign(payload_b64.as_bytes());

        debug!(user_id = %user_id, product, "minted assertion");
        Ok(MintedAssertion {
            assertion: token::join(&payload_b64, &signature.to_bytes()),
            expires_in_secs: ASSERTION_TTL_SECS,
        })
    }

    /// Updates the user's usage counters. Advisory only: a failure here is
    /// logged and the mint proceeds.
    async fn record_usage(&self, user_id: &UserId, client_version: Option<&str>) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let version = client_version.map(str::to_string);
        let result = self
            .directory
            .update_metadata(
                user_id,
                Box::new(move |metadata| {
                    let mut stats: UsageStats = metadata
                        .get(METADATA_USAGE)
                        .and_then(|v| serde_json::from_value(v.clone()).ok())
                        .unwrap_or_default();
                    stats.record(now_ms, version.as_deref());
                    let value =
                        serde_json::to_value(&stats).expect("usage stats serialize to JSON");
                    metadata.insert(METADATA_USAGE.to_string(), value);
                }),
            )
            .await;

        if let Err(e) = result {
            warn!(user_id = %user_id, error = %e, "usage write failed, continuing");
        }
    }
}

/// How an assertion's validity window relates to a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionFreshness {
    /// Before `exp`.
    Fresh,
    /// Past `exp` but inside the offline grace window.
    WithinGrace {
        /// Whole hours of grace remaining.
        hours_remaining: i64,
    },
    /// Past the grace window.
    Expired,
}

impl AssertionFreshness {
    /// Returns true if an offline client may still honor the assertion.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Fresh | Self::WithinGrace { .. })
    }
}

/// A parsed and signature-verified assertion.
#[derive(Debug, Clone)]
pub struct Assertion {
    raw: String,
    claims: AssertionClaims,
}

impl Assertion {
    /// Parses and verifies an assertion against the published public key.
    ///
    /// Verification is purely cryptographic plus the `typ` check; expiry
    /// is a separate [`freshness_at`](Self::freshness_at) question so
    /// offline clients can apply the grace window themselves.
    pub fn verify(token_str: &str, verifying_key: &VerifyingKey) -> LicenseResult<Self> {
        let (payload_b64, signature_b64) = token::split(token_str)?;

        let sig_bytes = token::decode_signature(signature_b64)?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|_| LicenseError::InvalidFormat("invalid signature length".to_string()))?;
        verifying_key
            .verify(payload_b64.as_bytes(), &signature)
            .map_err(|_| LicenseError::InvalidSignature)?;

        let claims: AssertionClaims = token::decode_payload(payload_b64)?;
        if claims.typ != ASSERTION_TYP {
            return Err(LicenseError::InvalidClaims(format!(
                "unexpected token type {:?}",
                claims.typ
            )));
        }

        Ok(Self {
            raw: token_str.trim().to_string(),
            claims,
        })
    }

    /// The raw token string.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The decoded claims.
    #[must_use]
    pub fn claims(&self) -> &AssertionClaims {
        &self.claims
    }

    /// Where the assertion stands relative to `now` (seconds since epoch).
    #[must_use]
    pub fn freshness_at(&self, now: i64) -> AssertionFreshness {
        if now < self.claims.exp {
            return AssertionFreshness::Fresh;
        }
        let grace_secs = self.claims.offline_grace_hours * 60 * 60;
        let past_expiry = now - self.claims.exp;
        if past_expiry < grace_secs {
            AssertionFreshness::WithinGrace {
                hours_remaining: (grace_secs - past_expiry) / (60 * 60),
            }
        } else {
            AssertionFreshness::Expired
        }
    }
}
