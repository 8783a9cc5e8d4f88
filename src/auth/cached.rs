//! Token manager that consults the token store before going to the network.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use super::acquirer::{StorageOption, TokenAcquirer};
use super::credentials::Credentials;
use super::error::AuthError;
use super::manager::{ManagerConfig, TokenManager};
use super::store::{FileTokenStore, TokenStore};
use super::token::TokenPair;

/// Cached pairs expiring sooner than this are treated as stale.
pub const CACHE_FRESHNESS_MINUTES: i64 = 5;

/// Wraps a [`TokenManager`] with a disk (or any [`TokenStore`]) cache.
///
/// Every pair this manager obtains is written through the store; none of
/// them arm the periodic timer.
pub struct CachedTokenManager {
    manager: TokenManager,
    store: Arc<dyn TokenStore>,
}

impl CachedTokenManager {
    /// Cache in the default token directory.
    pub fn new(credentials: Credentials, lifetime_secs: Option<u64>) -> Self {
        Self::with_config(credentials, lifetime_secs, ManagerConfig::default())
    }

    /// Use `config.store` when set, otherwise a default [`FileTokenStore`].
    pub fn with_config(
        credentials: Credentials,
        lifetime_secs: Option<u64>,
        mut config: ManagerConfig,
    ) -> Self {
        let store = config
            .store
            .take()
            .unwrap_or_else(|| Arc::new(FileTokenStore::new_default()));
        config.store = Some(store.clone());
        Self {
            manager: TokenManager::with_config(credentials, lifetime_secs, config),
            store,
        }
    }

    pub fn manager(&self) -> &TokenManager {
        &self.manager
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Load the cached pair, refresh or exchange as needed.
    ///
    /// Gate waiters see the final pair only. An unreadable cache is
    /// published to them as an error.
    pub async fn begin_flow(&self) -> Result<TokenPair, AuthError> {
        let client_id = self.manager.client_id().to_string();
        let cached = match self.load_cached(&client_id) {
            Ok(cached) => cached,
            Err(err) => {
                let gate = self.manager.gate();
                gate.enter();
                gate.leave(Err(err.clone()));
                return Err(err);
            }
        };
        let Some(pair) = cached else {
            return self.manager.begin_flow(StorageOption::StoreToFile).await;
        };

        if pair.has_access_token()
            && !pair.expires_within(Duration::minutes(CACHE_FRESHNESS_MINUTES))
        {
            tracing::debug!(client_id = %client_id, "Using cached access token");
            return self.manager.adopt(pair, StorageOption::StoreToFile).await;
        }
        if pair.refresh_token.is_empty() {
            return self.manager.begin_flow(StorageOption::StoreToFile).await;
        }

        tracing::debug!(client_id = %client_id, "Cached access token is stale");
        let gate = self.manager.gate();
        gate.enter();
        let outcome = self.renew_stale(pair).await;
        gate.leave(outcome.clone());
        outcome
    }

    async fn renew_stale(&self, pair: TokenPair) -> Result<TokenPair, AuthError> {
        self.manager.adopt(pair, StorageOption::StoreToFile).await?;
        match self.manager.refresh(StorageOption::StoreToFile).await {
            Ok(refreshed) => return Ok(refreshed),
            Err(err) => {
                tracing::warn!(error = %err, "Refreshing cached token failed, exchanging code")
            }
        }
        self.manager.begin_flow(StorageOption::StoreToFile).await
    }

    pub async fn refresh(&self) -> Result<TokenPair, AuthError> {
        self.manager.refresh(StorageOption::StoreToFile).await
    }

    pub fn access_token(&self) -> String {
        self.manager.access_token()
    }

    pub async fn wait_ready(&self) -> Result<TokenPair, AuthError> {
        self.manager.wait_ready().await
    }

    fn load_cached(&self, client_id: &str) -> Result<Option<TokenPair>, AuthError> {
        if !self.store.exists(client_id) {
            return Ok(None);
        }
        self.store.load(client_id).map_err(|err| {
            tracing::warn!(error = %err, client_id = %client_id, "Token cache unreadable");
            err
        })
    }
}

impl std::fmt::Debug for CachedTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedTokenManager")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenAcquirer for CachedTokenManager {
    async fn begin_flow(&self) -> Result<TokenPair, AuthError> {
        CachedTokenManager::begin_flow(self).await
    }

    fn current_access_token(&self) -> Option<String> {
        Some(self.access_token()).filter(|token| !token.is_empty())
    }

    async fn refresh(&self) -> Result<TokenPair, AuthError> {
        CachedTokenManager::refresh(self).await
    }

    async fn wait_ready(&self) -> Result<TokenPair, AuthError> {
        CachedTokenManager::wait_ready(self).await
    }
}
