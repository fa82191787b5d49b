//! Server configuration.
//!
//! Flags cover what an operator sets per invocation (bind address, key
//! file path, verbosity); environment variables cover deployment-shaped
//! settings and secrets:
//!
//! - `LATCHKEY_API_KEY_SECRET` — base64 HMAC secret for API keys
//! - `LATCHKEY_WEBHOOK_SECRET` — billing webhook signing secret
//! - `LATCHKEY_DIRECTORY_URL` / `LATCHKEY_DIRECTORY_TOKEN` — profile
//!   directory endpoint and its bearer token
//! - `LATCHKEY_SESSION_URL` — site session endpoint
//! - `LATCHKEY_PUBLIC_URL` — externally visible base URL
//! - `LATCHKEY_LINK_TTL_SECS` — pairing code lifetime
//!
//! Everything has a development default, so a bare `latchkey-server`
//! starts with in-memory state and ephemeral secrets (each with a
//! warning, since nothing survives a restart that way).

use crate::sessions::{HttpSessions, HttpSessionsConfig, MemorySessions, SessionVerifier};
use anyhow::{Context, Result, anyhow};
use ed25519_dalek::SigningKey;
use latchkey_directory::{Directory, HttpDirectory, HttpDirectoryConfig, MemoryDirectory};
use latchkey_license::KeySecret;
use rand::{RngCore, rngs::OsRng};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs};
use tracing::{info, warn};

/// Issuer name stamped into every token.
pub const DEFAULT_ISSUER: &str = "latchkey";

/// Default pairing code lifetime.
pub const DEFAULT_LINK_TTL: Duration = Duration::from_secs(300);

/// Runtime configuration, assembled from flags and environment.
#[derive(Debug)]
pub struct ServerConfig {
    /// Address for the HTTP listener.
    pub bind: SocketAddr,
    /// Externally visible base URL, used to build pairing URLs.
    pub public_url: String,
    /// Issuer name for minted tokens.
    pub issuer: String,
    /// HMAC secret for API keys.
    pub api_key_secret: KeySecret,
    /// Ed25519 keypair for assertions.
    pub signing_key: SigningKey,
    /// Billing webhook signing secret. Unsigned deliveries are accepted
    /// (with a warning) when unset.
    pub webhook_secret: Option<String>,
    /// Profile directory base URL; in-memory directory when unset.
    pub directory_url: Option<String>,
    /// Bearer token for the profile directory.
    pub directory_token: Option<String>,
    /// Session endpoint base URL; all sessions are refused when unset.
    pub session_url: Option<String>,
    /// Pairing code lifetime.
    pub link_ttl: Duration,
}

impl ServerConfig {
    /// Loads configuration from the environment and the assertion key
    /// file, generating and persisting a fresh keypair on first run.
    pub fn load(bind: SocketAddr, assertion_key: &Path) -> Result<Self> {
        let api_key_secret = match env::var("LATCHKEY_API_KEY_SECRET") {
            Ok(encoded) => KeySecret::from_base64(&encoded)
                .context("LATCHKEY_API_KEY_SECRET is not a valid base64 secret")?,
            Err(_) => {
                warn!(
                    "LATCHKEY_API_KEY_SECRET not set; using an ephemeral secret, \
                     issued keys will not survive a restart"
                );
                KeySecret::generate()
            }
        };

        let signing_key = load_or_generate_signing_key(assertion_key)?;

        let webhook_secret = env::var("LATCHKEY_WEBHOOK_SECRET").ok();
        if webhook_secret.is_none() {
            warn!("LATCHKEY_WEBHOOK_SECRET not set; webhook deliveries will not be authenticated");
        }

        let link_ttl = match env::var("LATCHKEY_LINK_TTL_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .context("LATCHKEY_LINK_TTL_SECS must be a number of seconds")?,
            ),
            Err(_) => DEFAULT_LINK_TTL,
        };

        Ok(Self {
            bind,
            public_url: env::var("LATCHKEY_PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://{bind}")),
            issuer: DEFAULT_ISSUER.to_string(),
            api_key_secret,
            signing_key,
            webhook_secret,
            directory_url: env::var("LATCHKEY_DIRECTORY_URL").ok(),
            directory_token: env::var("LATCHKEY_DIRECTORY_TOKEN").ok(),
            session_url: env::var("LATCHKEY_SESSION_URL").ok(),
            link_ttl,
        })
    }

    /// The directory backend this configuration selects.
    pub fn directory(&self) -> Arc<dyn Directory> {
        match &self.directory_url {
            Some(url) => Arc::new(HttpDirectory::new(HttpDirectoryConfig {
                base_url: url.clone(),
                api_token: self.directory_token.clone(),
                ..HttpDirectoryConfig::default()
            })),
            None => {
                warn!(
                    "LATCHKEY_DIRECTORY_URL not set; using in-memory directory, \
                     state will not survive a restart"
                );
                Arc::new(MemoryDirectory::new())
            }
        }
    }

    /// The session verifier this configuration selects.
    pub fn sessions(&self) -> Arc<dyn SessionVerifier> {
        match &self.session_url {
            Some(url) => Arc::new(HttpSessions::new(HttpSessionsConfig {
                base_url: url.clone(),
                ..HttpSessionsConfig::default()
            })),
            None => {
                warn!(
                    "LATCHKEY_SESSION_URL not set; session-authenticated routes \
                     will refuse all requests"
                );
                Arc::new(MemorySessions::new())
            }
        }
    }
}

/// Loads the assertion signing key, or generates one on first run.
///
/// The file holds the raw 32-byte Ed25519 seed. Losing it invalidates
/// every published public key, so deployments must persist it.
fn load_or_generate_signing_key(path: &Path) -> Result<SigningKey> {
    if path.exists() {
        info!("Loading assertion key from {:?}", path);
        let bytes = fs::read(path).context("Failed to read assertion key file")?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow!("assertion key file must hold exactly 32 bytes"))?;
        Ok(SigningKey::from_bytes(&seed))
    } else {
        info!("Generating new assertion key at {:?}", path);
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        fs::write(path, seed).context("Failed to write assertion key file")?;
        Ok(SigningKey::from_bytes(&seed))
    }
}
