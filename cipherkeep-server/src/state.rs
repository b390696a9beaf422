//! Shared application state handed to every handler.

use crate::auth::TokenIssuer;
use crate::challenge::{ChallengeCache, ChallengeNotifier, LogNotifier};
use crate::config::ServerConfig;
use crate::storage::SecretStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: SecretStore,
    pub tokens: Arc<TokenIssuer>,
    pub challenges: Arc<ChallengeCache>,
    pub notifier: Arc<dyn ChallengeNotifier>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Assemble state from configuration with the logging notifier.
    pub fn new(store: SecretStore, config: ServerConfig) -> Self {
        Self::with_notifier(store, config, Arc::new(LogNotifier))
    }

    pub fn with_notifier(
        store: SecretStore,
        config: ServerConfig,
        notifier: Arc<dyn ChallengeNotifier>,
    ) -> Self {
        let tokens = match &config.token_secret {
            Some(secret) => TokenIssuer::new(secret.as_bytes().to_vec(), config.token_ttl()),
            None => {
                tracing::warn!("No token_secret configured; tokens will not survive a restart");
                TokenIssuer::ephemeral(config.token_ttl())
            }
        };

        Self {
            store,
            tokens: Arc::new(tokens),
            challenges: Arc::new(ChallengeCache::new(config.challenge_ttl())),
            notifier,
            config: Arc::new(config),
        }
    }
}
