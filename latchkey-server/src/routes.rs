//! HTTP routes and handlers.
//!
//! Three authentication regimes share this router:
//!
//! - session-authenticated (browser side): `/key/issue`, `/key/revoke`,
//!   `/link/complete`
//! - API-key-authenticated (CLI side): `/assertion`
//! - public: `/health`, `/assertion/public_key`, `/link/start`,
//!   `/link/poll`, and `/billing/webhook` (authenticated by its own
//!   signature scheme instead of a bearer credential)

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use latchkey_billing::{BillingEvent, WebhookEvent, verify_webhook_signature};
use latchkey_pairing::{LinkGrant, LinkStatus};
use latchkey_types::UserId;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Header carrying the billing webhook signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-billing-signature";

/// Build the HTTP API router with the given application state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/assertion/public_key", get(assertion_public_key))
        .route("/key/issue", post(key_issue))
        .route("/key/revoke", post(key_revoke))
        .route("/assertion", post(assertion_mint))
        .route("/link/start", post(link_start))
        .route("/link/poll", get(link_poll))
        .route("/link/complete", post(link_complete))
        .route("/billing/webhook", post(billing_webhook))
        .with_state(state)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    /// Assertion verifying key, standard base64.
    pub public_key_b64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueKeyResponse {
    pub api_key: String,
    pub version: i64,
    /// Expiry timestamp, seconds since epoch.
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeKeyResponse {
    /// The user's new key version.
    pub version: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MintAssertionRequest {
    /// Product to assert; defaults to the CLI product.
    #[serde(default)]
    pub product: Option<String>,
    /// Client version string, recorded in usage stats.
    #[serde(default)]
    pub client_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintAssertionResponse {
    pub assertion: String,
    /// Seconds until the assertion expires.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStartResponse {
    pub code: String,
    pub status: LinkStatus,
    /// Expiry timestamp, seconds since epoch.
    pub expires_at: i64,
    /// Where the CLI should poll for the credential.
    pub poll_url: String,
    /// Where the user approves the pairing in a browser.
    pub verification_url: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkPollQuery {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkPollResponse {
    pub status: LinkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCompleteRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCompleteResponse {
    pub status: LinkStatus,
}

/// Extracts a bearer credential from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Resolves the request's session to a user, or rejects it.
async fn require_session(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer session token".to_string()))?;
    state
        .sessions
        .resolve(token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("session not recognized".to_string()))
}

async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn assertion_public_key(State(state): State<AppState>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        public_key_b64: state.assertions.public_key_b64(),
    })
}

async fn key_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<IssueKeyResponse>, ApiError> {
    let user_id = require_session(&state, &headers).await?;
    let issued = state.keys.issue(&user_id).await?;
    Ok(Json(IssueKeyResponse {
        api_key: issued.token,
        version: issued.version,
        expires_at: issued.expires_at,
    }))
}

async fn key_revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RevokeKeyResponse>, ApiError> {
    let user_id = require_session(&state, &headers).await?;
    let version = state.keys.revoke(&user_id).await?;
    Ok(Json(RevokeKeyResponse { version }))
}

async fn assertion_mint(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MintAssertionRequest>,
) -> Result<Json<MintAssertionResponse>, ApiError> {
    let api_key = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer api key".to_string()))?;
    let minted = state
        .assertions
        .mint(api_key, req.product.as_deref(), req.client_version.as_deref())
        .await?;
    Ok(Json(MintAssertionResponse {
        assertion: minted.assertion,
        expires_in: minted.expires_in_secs,
    }))
}

async fn link_start(State(state): State<AppState>) -> Json<LinkStartResponse> {
    let record = state.links.start().await;
    Json(LinkStartResponse {
        poll_url: format!("{}/link/poll?code={}", state.public_url, record.code),
        verification_url: format!("{}/link?code={}", state.public_url, record.code),
        expires_at: record.expires_at_ms / 1000,
        status: record.status,
        code: record.code,
    })
}

/// The CLI's polling half of the pairing handshake.
///
/// A ready code is consumed by the poll that observes it: the credential
/// is returned exactly once and every later (or concurrently racing)
/// poll gets a conflict.
async fn link_poll(
    State(state): State<AppState>,
    Query(query): Query<LinkPollQuery>,
) -> Result<Json<LinkPollResponse>, ApiError> {
    let record = state
        .links
        .get(&query.code)
        .await
        .ok_or_else(|| ApiError::NotFound("unknown pairing code".to_string()))?;

    match record.status {
        LinkStatus::Expired => Err(ApiError::CodeExpired),
        LinkStatus::Pending => Ok(Json(LinkPollResponse {
            status: LinkStatus::Pending,
            api_key: None,
            version: None,
        })),
        LinkStatus::Ready | LinkStatus::Completed => {
            let consumed = state.links.consume(&query.code).await?;
            let grant = consumed
                .grant
                .ok_or_else(|| ApiError::Internal("consumed link carries no grant".to_string()))?;
            Ok(Json(LinkPollResponse {
                status: LinkStatus::Ready,
                api_key: Some(grant.api_key),
                version: Some(grant.version),
            }))
        }
    }
}

/// The browser's half of the pairing handshake.
///
/// The key is issued before the record is touched, so a user without an
/// active entitlement gets `NotEntitled` while the code stays pending
/// and can be completed after they purchase.
async fn link_complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LinkCompleteRequest>,
) -> Result<Json<LinkCompleteResponse>, ApiError> {
    let user_id = require_session(&state, &headers).await?;

    match state.links.get(&req.code).await {
        None => return Err(ApiError::CodeUnusable),
        Some(record) if record.status == LinkStatus::Expired => {
            return Err(ApiError::CodeExpired);
        }
        Some(_) => {}
    }

    let issued = state.keys.issue(&user_id).await?;
    let record = state
        .links
        .complete(
            &req.code,
            LinkGrant {
                user_id,
                api_key: issued.token,
                version: issued.version,
            },
        )
        .await?;
    Ok(Json(LinkCompleteResponse {
        status: record.status,
    }))
}

/// Billing provider webhook sink.
///
/// Unattributable and unhandled events are acknowledged with 200 so the
/// provider does not retry them forever; only signature failures and
/// malformed bodies are rejected.
async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if let Some(secret) = state.webhook_secret.as_ref() {
        let signature = headers
            .get(WEBHOOK_SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing webhook signature".to_string()))?;
        if !verify_webhook_signature(secret, signature, &body) {
            warn!("billing webhook signature verification failed");
            return Err(ApiError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    } else {
        warn!("webhook secret not configured; accepting unsigned delivery");
    }

    let envelope = WebhookEvent::parse(&body)?;
    if let Some(event) = BillingEvent::from_webhook(&envelope) {
        state.reconciler.apply(event).await?;
    }
    Ok(StatusCode::OK)
}
