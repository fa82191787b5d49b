//! Shared application state.

use crate::config::ServerConfig;
use crate::sessions::SessionVerifier;
use latchkey_billing::Reconciler;
use latchkey_directory::{Directory, EntitlementStore};
use latchkey_license::{AssertionService, KeyService};
use latchkey_pairing::{LinkConfig, LinkStore};
use std::sync::Arc;

/// Everything the handlers need, cloned per request by the router.
#[derive(Clone)]
pub struct AppState {
    pub keys: Arc<KeyService>,
    pub assertions: Arc<AssertionService>,
    pub entitlements: EntitlementStore,
    pub links: Arc<LinkStore>,
    pub reconciler: Reconciler,
    pub sessions: Arc<dyn SessionVerifier>,
    pub webhook_secret: Option<String>,
    pub public_url: String,
}

impl AppState {
    /// Wires the services together over one directory backend.
    pub fn new(
        directory: Arc<dyn Directory>,
        sessions: Arc<dyn SessionVerifier>,
        config: &ServerConfig,
    ) -> Self {
        let keys = Arc::new(KeyService::new(
            directory.clone(),
            config.api_key_secret.clone(),
            config.issuer.clone(),
        ));
        let assertions = Arc::new(AssertionService::new(
            keys.clone(),
            directory.clone(),
            config.signing_key.clone(),
        ));
        let entitlements = EntitlementStore::new(directory);
        let links = Arc::new(LinkStore::new(LinkConfig {
            ttl: config.link_ttl,
            ..LinkConfig::default()
        }));
        let reconciler = Reconciler::new(entitlements.clone());

        Self {
            keys,
            assertions,
            entitlements,
            links,
            reconciler,
            sessions,
            webhook_secret: config.webhook_secret.clone(),
            public_url: config.public_url.clone(),
        }
    }
}
