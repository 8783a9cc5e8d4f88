//! Authorization-code exchange, refresh and periodic renewal.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use strum::Display;

use super::acquirer::{StorageOption, TokenAcquirer};
use super::credentials::{Credentials, RefreshSchedule};
use super::error::AuthError;
use super::gate::CompletionGate;
use super::store::TokenStore;
use super::timer::{RefreshTimer, TimerState};
use super::token::{TokenPair, TokenResponse};
use crate::http::{HttpMethod, NetworkRequest};

/// Zoho accounts token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.zoho.com/oauth/v2/token";

/// Lifecycle of a [`TokenManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ManagerState {
    /// Credentials failed validation; the manager never touches the network.
    Uninitialized,
    /// Valid credentials, no tokens yet.
    Ready,
    Exchanging,
    Active,
    Refreshing,
}

/// Optional collaborators for a [`TokenManager`].
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use zcrm_auth::auth::{FileTokenStore, ManagerConfig};
///
/// let config = ManagerConfig::builder()
///     .token_url("https://accounts.zoho.eu/oauth/v2/token")
///     .store(Arc::new(FileTokenStore::new_default()))
///     .build();
/// ```
#[derive(Builder, Clone)]
pub struct ManagerConfig {
    #[builder(into, default = DEFAULT_TOKEN_URL.to_string())]
    pub token_url: String,
    pub http_client: Option<reqwest::Client>,
    pub store: Option<Arc<dyn TokenStore>>,
    /// Replaces the refresh interval derived from the token lifetime.
    pub refresh_interval: Option<Duration>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Owns one client's token pair and keeps it fresh.
///
/// Construction validates the credentials. Invalid credentials leave the
/// manager in [`ManagerState::Uninitialized`]: every flow call returns
/// [`AuthError::InvalidCredentials`] and no request is ever sent.
///
/// # Example
/// ```no_run
/// use zcrm_auth::auth::{Credentials, StorageOption, TokenManager};
///
/// # async fn example() -> Result<(), zcrm_auth::auth::AuthError> {
/// let credentials = Credentials::builder()
///     .client_id("1000.CLIENT")
///     .client_secret("secret-value")
///     .redirect_uri("https://www.example.com")
///     .auth_code("1000.code")
///     .build();
/// let manager = TokenManager::new(credentials, Some(3600));
/// let pair = manager.begin_flow(StorageOption::InMemory).await?;
/// println!("token expires at {}", pair.expires_at);
/// # Ok(())
/// # }
/// ```
pub struct TokenManager {
    inner: Arc<ManagerInner>,
}

impl TokenManager {
    pub fn new(credentials: Credentials, lifetime_secs: Option<u64>) -> Self {
        Self::with_config(credentials, lifetime_secs, ManagerConfig::default())
    }

    pub fn with_config(
        credentials: Credentials,
        lifetime_secs: Option<u64>,
        config: ManagerConfig,
    ) -> Self {
        let inert = credentials.validate().err();
        let schedule = match (&inert, config.refresh_interval) {
            (Some(_), _) => RefreshSchedule::default(),
            (None, Some(interval)) => {
                RefreshSchedule::from_lifetime(lifetime_secs).with_interval(interval)
            }
            (None, None) => RefreshSchedule::from_lifetime(lifetime_secs),
        };
        let gate = CompletionGate::new();
        let state = match &inert {
            Some(err) => {
                tracing::warn!(error = %err, "Token manager left uninitialized");
                gate.leave(Err(err.clone()));
                ManagerState::Uninitialized
            }
            None => ManagerState::Ready,
        };

        Self {
            inner: Arc::new(ManagerInner {
                credentials,
                inert,
                schedule,
                token_url: config.token_url,
                client: config
                    .http_client
                    .unwrap_or_else(|| crate::http::shared_client().clone()),
                store: config.store,
                tokens: RwLock::new(None),
                state: Mutex::new(state),
                storage: Mutex::new(StorageOption::InMemory),
                flow_lock: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
                gate,
                timer: RefreshTimer::new(schedule),
            }),
        }
    }

    /// Exchange the authorization code for a token pair.
    pub async fn begin_flow(&self, storage: StorageOption) -> Result<TokenPair, AuthError> {
        self.inner.exchange(storage).await
    }

    /// Trade the refresh token for a new access token.
    pub async fn refresh(&self, storage: StorageOption) -> Result<TokenPair, AuthError> {
        self.inner.refresh(storage).await
    }

    /// Install an already issued pair without touching the network.
    pub(crate) async fn adopt(
        &self,
        pair: TokenPair,
        storage: StorageOption,
    ) -> Result<TokenPair, AuthError> {
        self.inner.adopt(pair, storage).await
    }

    /// Flip the refresh timer between suspended and resumed.
    pub fn toggle_timer(&self) -> TimerState {
        self.inner.timer.toggle()
    }

    pub fn resume_timer(&self) -> bool {
        self.inner.timer.resume()
    }

    pub fn suspend_timer(&self) -> bool {
        self.inner.timer.suspend()
    }

    pub fn timer_state(&self) -> TimerState {
        self.inner.timer.state()
    }

    pub fn timer_armed(&self) -> bool {
        self.inner.timer.is_armed()
    }

    pub fn schedule(&self) -> RefreshSchedule {
        self.inner.schedule
    }

    pub fn state(&self) -> ManagerState {
        self.inner.state()
    }

    /// Current access token; empty until one has been obtained.
    pub fn access_token(&self) -> String {
        self.inner
            .tokens()
            .map(|pair| pair.access_token)
            .unwrap_or_default()
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        self.inner.tokens()
    }

    pub fn client_id(&self) -> &str {
        &self.inner.credentials.client_id
    }

    pub fn store(&self) -> Option<&Arc<dyn TokenStore>> {
        self.inner.store.as_ref()
    }

    pub fn storage_option(&self) -> StorageOption {
        self.inner.storage_option()
    }

    /// Wait for the gate; see [`CompletionGate::wait`].
    pub async fn wait_ready(&self) -> Result<TokenPair, AuthError> {
        self.inner.gate.wait().await
    }

    pub fn gate(&self) -> &CompletionGate {
        &self.inner.gate
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("client_id", &self.inner.credentials.client_id)
            .field("state", &self.state())
            .field("schedule", &self.inner.schedule)
            .field("timer", &self.inner.timer)
            .finish()
    }
}

#[async_trait]
impl TokenAcquirer for TokenManager {
    async fn begin_flow(&self) -> Result<TokenPair, AuthError> {
        TokenManager::begin_flow(self, StorageOption::InMemory).await
    }

    fn current_access_token(&self) -> Option<String> {
        Some(self.access_token()).filter(|token| !token.is_empty())
    }

    async fn refresh(&self) -> Result<TokenPair, AuthError> {
        TokenManager::refresh(self, self.storage_option()).await
    }

    async fn wait_ready(&self) -> Result<TokenPair, AuthError> {
        TokenManager::wait_ready(self).await
    }
}

type TickFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

struct ManagerInner {
    credentials: Credentials,
    inert: Option<AuthError>,
    schedule: RefreshSchedule,
    token_url: String,
    client: reqwest::Client,
    store: Option<Arc<dyn TokenStore>>,
    tokens: RwLock<Option<TokenPair>>,
    state: Mutex<ManagerState>,
    storage: Mutex<StorageOption>,
    // Serializes exchange, refresh and adopt.
    flow_lock: tokio::sync::Mutex<()>,
    // Bumped on every successful issue so queued refreshes can reuse it.
    generation: AtomicU64,
    gate: CompletionGate,
    timer: RefreshTimer,
}

impl ManagerInner {
    async fn exchange(self: &Arc<Self>, storage: StorageOption) -> Result<TokenPair, AuthError> {
        self.ensure_initialized()?;
        let _flow = self.flow_lock.lock().await;
        self.gate.enter();
        let prior = self.replace_state(ManagerState::Exchanging);
        tracing::info!(client_id = %self.credentials.client_id, "Exchanging authorization code");

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ("code", self.credentials.auth_code.as_str()),
        ];
        let outcome = match self.request_tokens(&params).await {
            Ok(payload) => self.issue_from_exchange(payload),
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(pair) => {
                self.install(pair.clone());
                self.replace_state(ManagerState::Active);
                self.apply_storage(storage, pair);
                tracing::info!(expires_at = %pair.expires_at, "Authorization code exchanged");
            }
            Err(err) => {
                self.replace_state(prior);
                tracing::warn!(error = %err, "Authorization code exchange failed");
            }
        }
        self.gate.leave(outcome.clone());
        outcome
    }

    async fn refresh(self: &Arc<Self>, storage: StorageOption) -> Result<TokenPair, AuthError> {
        self.ensure_initialized()?;
        let seen = self.generation.load(Ordering::SeqCst);
        let _flow = self.flow_lock.lock().await;
        if self.generation.load(Ordering::SeqCst) != seen {
            if let Some(pair) = self.tokens().filter(TokenPair::has_access_token) {
                tracing::debug!("Reusing token issued while waiting to refresh");
                return Ok(pair);
            }
        }

        self.gate.enter();
        let Some(current) = self.tokens().filter(|pair| !pair.refresh_token.is_empty()) else {
            let err = AuthError::MissingRefreshToken;
            self.gate.leave(Err(err.clone()));
            return Err(err);
        };
        let prior = self.replace_state(ManagerState::Refreshing);
        tracing::info!(client_id = %self.credentials.client_id, "Refreshing access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", current.refresh_token.as_str()),
        ];
        let outcome = match self.request_tokens(&params).await {
            Ok(payload) => self.issue_from_refresh(current, payload),
            Err(err) => Err(err),
        };

        self.replace_state(prior);
        match &outcome {
            Ok(pair) => {
                self.install(pair.clone());
                self.apply_storage(storage, pair);
                tracing::info!(expires_at = %pair.expires_at, "Access token refreshed");
            }
            Err(err) => tracing::warn!(error = %err, "Access token refresh failed"),
        }
        self.gate.leave(outcome.clone());
        outcome
    }

    async fn adopt(
        self: &Arc<Self>,
        pair: TokenPair,
        storage: StorageOption,
    ) -> Result<TokenPair, AuthError> {
        self.ensure_initialized()?;
        let _flow = self.flow_lock.lock().await;
        self.gate.enter();
        self.install(pair.clone());
        self.replace_state(ManagerState::Active);
        self.set_storage_option(storage);
        if storage == StorageOption::InMemory {
            self.arm_timer();
        }
        tracing::info!(expires_at = %pair.expires_at, "Adopted cached token pair");
        self.gate.leave(Ok(pair.clone()));
        Ok(pair)
    }

    async fn request_tokens(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let mut request = NetworkRequest::new().with_client(self.client.clone());
        request.set_base_url(&self.token_url)?;
        request.add_query_params(params.iter().copied());
        request.set_method(HttpMethod::Post)?;

        let response = request.send().await?;
        if response.status.is_server_error() {
            return Err(AuthError::InvalidResponse(format!(
                "Token endpoint failed with status {}",
                response.status
            )));
        }
        let payload: TokenResponse = serde_json::from_str(&response.body)?;
        if let Some(error) = &payload.error {
            tracing::warn!(status = %response.status, error = %error, "Token endpoint reported an error");
        }
        Ok(payload)
    }

    fn issue_from_exchange(&self, payload: TokenResponse) -> Result<TokenPair, AuthError> {
        let lifetime = self.lifetime_of(&payload);
        match (payload.access_token, payload.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                let token_type = payload.token_type.unwrap_or_else(|| "Bearer".to_string());
                Ok(TokenPair::issued(access, refresh, token_type, lifetime))
            }
            _ => Err(AuthError::InvalidAuthorizationCode),
        }
    }

    fn issue_from_refresh(
        &self,
        mut current: TokenPair,
        payload: TokenResponse,
    ) -> Result<TokenPair, AuthError> {
        let lifetime = self.lifetime_of(&payload);
        match payload.access_token.filter(|token| !token.is_empty()) {
            Some(access) => {
                current.apply_refresh(access, lifetime);
                Ok(current)
            }
            None => {
                self.invalidate_access_token();
                Err(AuthError::InvalidResponse(
                    "refresh response missing access_token".to_string(),
                ))
            }
        }
    }

    /// Server-declared seconds when present, otherwise the configured lifetime.
    fn lifetime_of(&self, payload: &TokenResponse) -> u64 {
        payload
            .expires_in_sec
            .or(payload.expires_in)
            .filter(|secs| *secs > 0)
            .unwrap_or_else(|| self.schedule.lifetime_secs())
    }

    fn apply_storage(self: &Arc<Self>, storage: StorageOption, pair: &TokenPair) {
        self.set_storage_option(storage);
        match storage {
            StorageOption::StoreToFile => match &self.store {
                Some(store) => {
                    if let Err(err) = store.save(&self.credentials.client_id, pair) {
                        tracing::warn!(error = %err, "Failed to persist token pair");
                    }
                }
                None => tracing::warn!("StoreToFile requested without a token store"),
            },
            StorageOption::InMemory => self.arm_timer(),
        }
    }

    /// Arm and resume the timer the first time only. Later calls leave a
    /// caller's suspend in place.
    fn arm_timer(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let armed = self.timer.arm(move || -> TickFuture {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let storage = inner.storage_option();
                if let Err(err) = inner.refresh(storage).await {
                    tracing::warn!(error = %err, "Scheduled refresh failed");
                }
            })
        });
        if armed {
            self.timer.resume();
        }
    }

    fn ensure_initialized(&self) -> Result<(), AuthError> {
        match &self.inert {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn install(&self, pair: TokenPair) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(pair);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn invalidate_access_token(&self) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(pair) = tokens.as_mut() {
            pair.access_token.clear();
        }
    }

    fn tokens(&self) -> Option<TokenPair> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn state(&self) -> ManagerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_state(&self, next: ManagerState) -> ManagerState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *state, next)
    }

    fn storage_option(&self) -> StorageOption {
        *self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_storage_option(&self, storage: StorageOption) {
        *self.storage.lock().unwrap_or_else(PoisonError::into_inner) = storage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(client_id: &str) -> Credentials {
        Credentials::builder()
            .client_id(client_id)
            .client_secret("xyz12")
            .redirect_uri("http://r")
            .auth_code("code1")
            .build()
    }

    #[test]
    fn valid_credentials_start_ready_with_schedule() {
        let manager = TokenManager::new(credentials("abc12"), Some(3600));
        assert_eq!(manager.state(), ManagerState::Ready);
        assert_eq!(manager.schedule().interval.as_secs(), 3420);
        assert_eq!(manager.access_token(), "");
        assert!(!manager.timer_armed());
    }

    #[tokio::test]
    async fn invalid_credentials_leave_manager_inert() {
        let manager = TokenManager::new(credentials("abc"), Some(3600));
        assert_eq!(manager.state(), ManagerState::Uninitialized);
        assert_eq!(manager.schedule(), RefreshSchedule::default());

        let err = manager.begin_flow(StorageOption::InMemory).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        let err = manager.refresh(StorageOption::InMemory).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));

        assert!(matches!(
            manager.wait_ready().await,
            Err(AuthError::InvalidCredentials(_))
        ));
        assert_eq!(manager.access_token(), "");
        assert_eq!(manager.state(), ManagerState::Uninitialized);
    }

    #[tokio::test]
    async fn refresh_before_exchange_reports_missing_refresh_token() {
        let manager = TokenManager::new(credentials("abc12"), None);
        let err = manager.refresh(StorageOption::InMemory).await.unwrap_err();
        assert_eq!(err, AuthError::MissingRefreshToken);
        assert_eq!(manager.gate().pending(), 0);
    }

    #[tokio::test]
    async fn adopt_installs_pair_without_network() {
        let manager = TokenManager::new(credentials("abc12"), Some(3600));
        let pair = TokenPair::issued("cached", "R1", "Bearer", 3600);
        manager
            .adopt(pair.clone(), StorageOption::StoreToFile)
            .await
            .unwrap();
        assert_eq!(manager.access_token(), "cached");
        assert_eq!(manager.state(), ManagerState::Active);
        assert!(!manager.timer_armed());
        assert_eq!(manager.wait_ready().await.unwrap(), pair);
    }

    #[test]
    fn server_lifetime_wins_over_configured_lifetime() {
        let manager = TokenManager::new(credentials("abc12"), Some(7200));
        let inner = &manager.inner;
        let declared = TokenResponse {
            expires_in: Some(1800),
            ..Default::default()
        };
        assert_eq!(inner.lifetime_of(&declared), 1800);
        let zoho_style = TokenResponse {
            expires_in: Some(3_600_000),
            expires_in_sec: Some(3600),
            ..Default::default()
        };
        assert_eq!(inner.lifetime_of(&zoho_style), 3600);
        assert_eq!(inner.lifetime_of(&TokenResponse::default()), 7200);
    }

    #[test]
    fn timer_toggle_is_exposed() {
        let manager = TokenManager::new(credentials("abc12"), None);
        assert_eq!(manager.toggle_timer(), TimerState::Resumed);
        assert!(!manager.resume_timer());
        assert!(manager.suspend_timer());
        assert_eq!(manager.timer_state(), TimerState::Suspended);
    }
}
