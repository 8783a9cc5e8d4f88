//! Capability shared by the plain and the cache-backed token managers.

use async_trait::async_trait;
use strum::{Display, EnumString};

use super::error::AuthError;
use super::token::TokenPair;

/// Where a freshly issued token pair goes after it has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum StorageOption {
    /// Keep the pair in memory and let the periodic timer refresh it.
    #[default]
    InMemory,
    /// Persist the pair through the token store; no periodic timer.
    StoreToFile,
}

/// Anything that can hand out and renew an access token.
///
/// [`NetworkRequest`](crate::http::NetworkRequest) and
/// [`CrmClient`](crate::api::CrmClient) only talk to this trait.
#[async_trait]
pub trait TokenAcquirer: Send + Sync {
    /// Acquire the first token pair.
    async fn begin_flow(&self) -> Result<TokenPair, AuthError>;

    /// Current access token, `None` until one has been obtained.
    fn current_access_token(&self) -> Option<String>;

    /// Trade the refresh token for a new access token.
    async fn refresh(&self) -> Result<TokenPair, AuthError>;

    /// Wait for the first acquisition (or the latest refresh) to settle.
    async fn wait_ready(&self) -> Result<TokenPair, AuthError>;
}
