//! Configuration (layered: code > env > defaults).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{
    CachedTokenManager, Credentials, FileTokenStore, ManagerConfig, TokenManager,
    TokenStoreConfig,
};
use crate::error::{Result, ZcrmError};
use crate::http::{build_client, DEFAULT_API_BASE_URL};

/// Accounts server for the US data center.
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.zoho.com";
const TOKEN_PATH: &str = "/oauth/v2/token";

pub const ENV_CLIENT_ID: &str = "ZCRM_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "ZCRM_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "ZCRM_REDIRECT_URI";
pub const ENV_AUTH_CODE: &str = "ZCRM_AUTH_CODE";
pub const ENV_TOKEN_LIFETIME: &str = "ZCRM_TOKEN_LIFETIME";
pub const ENV_ACCOUNTS_URL: &str = "ZCRM_ACCOUNTS_URL";
pub const ENV_API_BASE_URL: &str = "ZCRM_API_BASE_URL";
pub const ENV_TOKEN_DIR: &str = "ZCRM_TOKEN_DIR";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "ZCRM_HTTP_TIMEOUT_SECS";

/// Everything needed to build a token manager and a CRM client.
///
/// `from_env` reads `.env` and the `ZCRM_*` variables; the `with_*` setters
/// override whatever the environment provided.
#[derive(Clone, Default)]
pub struct ZcrmConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub auth_code: Option<String>,
    pub token_lifetime: Option<u64>,
    pub accounts_url: Option<String>,
    pub api_base_url: Option<String>,
    pub token_dir: Option<PathBuf>,
    pub http_timeout: Option<Duration>,
}

impl fmt::Debug for ZcrmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZcrmConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_code", &self.auth_code.as_ref().map(|_| "<redacted>"))
            .field("token_lifetime", &self.token_lifetime)
            .field("accounts_url", &self.accounts_url)
            .field("api_base_url", &self.api_base_url)
            .field("token_dir", &self.token_dir)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl ZcrmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `.env` if present, then read the `ZCRM_*` variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // a missing .env is fine
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let parse_secs = |key: &str| -> Result<Option<u64>> {
            read(key)
                .map(|raw| {
                    raw.parse::<u64>().map_err(|_| {
                        ZcrmError::Configuration(format!("{key} must be a whole number of seconds, got {raw:?}"))
                    })
                })
                .transpose()
        };

        Ok(Self {
            client_id: read(ENV_CLIENT_ID),
            client_secret: read(ENV_CLIENT_SECRET),
            redirect_uri: read(ENV_REDIRECT_URI),
            auth_code: read(ENV_AUTH_CODE),
            token_lifetime: parse_secs(ENV_TOKEN_LIFETIME)?,
            accounts_url: read(ENV_ACCOUNTS_URL),
            api_base_url: read(ENV_API_BASE_URL),
            token_dir: read(ENV_TOKEN_DIR).map(PathBuf::from),
            http_timeout: parse_secs(ENV_HTTP_TIMEOUT_SECS)?.map(Duration::from_secs),
        })
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn with_auth_code(mut self, auth_code: impl Into<String>) -> Self {
        self.auth_code = Some(auth_code.into());
        self
    }

    pub fn with_token_lifetime(mut self, secs: u64) -> Self {
        self.token_lifetime = Some(secs);
        self
    }

    pub fn with_accounts_url(mut self, url: impl Into<String>) -> Self {
        self.accounts_url = Some(url.into());
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = Some(dir.into());
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Token endpoint under the configured accounts server.
    pub fn token_url(&self) -> String {
        let base = self.accounts_url.as_deref().unwrap_or(DEFAULT_ACCOUNTS_URL);
        format!("{}{TOKEN_PATH}", base.trim_end_matches('/'))
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    /// Credentials from the four required values. Length checks happen in
    /// the manager.
    pub fn credentials(&self) -> Result<Credentials> {
        let require = |value: &Option<String>, key: &str| {
            value
                .clone()
                .ok_or_else(|| ZcrmError::Configuration(format!("{key} is not set")))
        };
        Ok(Credentials::builder()
            .client_id(require(&self.client_id, ENV_CLIENT_ID)?)
            .client_secret(require(&self.client_secret, ENV_CLIENT_SECRET)?)
            .redirect_uri(require(&self.redirect_uri, ENV_REDIRECT_URI)?)
            .auth_code(require(&self.auth_code, ENV_AUTH_CODE)?)
            .build())
    }

    pub fn token_store(&self) -> FileTokenStore {
        match &self.token_dir {
            Some(dir) => FileTokenStore::new(TokenStoreConfig::new(dir.clone())),
            None => FileTokenStore::new_default(),
        }
    }

    pub fn http_client(&self) -> Result<Option<reqwest::Client>> {
        self.http_timeout.map(build_client).transpose()
    }

    pub fn manager_config(&self) -> Result<ManagerConfig> {
        Ok(ManagerConfig::builder()
            .token_url(self.token_url())
            .maybe_http_client(self.http_client()?)
            .store(Arc::new(self.token_store()))
            .build())
    }

    pub fn token_manager(&self) -> Result<TokenManager> {
        Ok(TokenManager::with_config(
            self.credentials()?,
            self.token_lifetime,
            self.manager_config()?,
        ))
    }

    pub fn cached_token_manager(&self) -> Result<CachedTokenManager> {
        Ok(CachedTokenManager::with_config(
            self.credentials()?,
            self.token_lifetime,
            self.manager_config()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn reads_all_variables() {
        let config = ZcrmConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "1000.CLIENT"),
            (ENV_CLIENT_SECRET, "secret-value"),
            (ENV_REDIRECT_URI, "https://www.example.com"),
            (ENV_AUTH_CODE, "1000.code"),
            (ENV_TOKEN_LIFETIME, "3600"),
            (ENV_ACCOUNTS_URL, "https://accounts.zoho.eu/"),
            (ENV_API_BASE_URL, "https://www.zohoapis.eu/crm/v2"),
            (ENV_TOKEN_DIR, "/tmp/zcrm"),
            (ENV_HTTP_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();

        assert_eq!(config.token_lifetime, Some(3600));
        assert_eq!(config.token_url(), "https://accounts.zoho.eu/oauth/v2/token");
        assert_eq!(config.api_base_url(), "https://www.zohoapis.eu/crm/v2");
        assert_eq!(config.token_dir, Some(PathBuf::from("/tmp/zcrm")));
        assert_eq!(config.http_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.credentials().unwrap().client_id, "1000.CLIENT");
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ZcrmConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.token_url(), "https://accounts.zoho.com/oauth/v2/token");
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);
        assert!(config.http_client().unwrap().is_none());
    }

    #[test]
    fn code_values_override_environment() {
        let config = ZcrmConfig::from_lookup(lookup(&[(ENV_CLIENT_ID, "from-env")]))
            .unwrap()
            .with_client_id("from-code");
        assert_eq!(config.client_id.as_deref(), Some("from-code"));
    }

    #[test]
    fn missing_credential_is_a_configuration_error() {
        let config = ZcrmConfig::new()
            .with_client_id("1000.CLIENT")
            .with_client_secret("secret-value")
            .with_redirect_uri("https://www.example.com");
        let err = config.credentials().unwrap_err();
        assert!(matches!(err, ZcrmError::Configuration(ref msg) if msg.contains(ENV_AUTH_CODE)));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = ZcrmConfig::from_lookup(lookup(&[(ENV_TOKEN_LIFETIME, "an hour")])).unwrap_err();
        assert!(matches!(err, ZcrmError::Configuration(_)));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = ZcrmConfig::from_lookup(lookup(&[(ENV_CLIENT_ID, "   ")])).unwrap();
        assert_eq!(config.client_id, None);
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = ZcrmConfig::new()
            .with_client_secret("secret-value")
            .with_auth_code("1000.code");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(!rendered.contains("1000.code"));
    }
}
