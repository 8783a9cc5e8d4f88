//! Shared reqwest client.

use std::sync::OnceLock;
use std::time::Duration;

use crate::error::ZcrmError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        build_client(DEFAULT_TIMEOUT).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
    })
}

/// Build a client with a custom timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ZcrmError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(4)
        .build()
        .map_err(ZcrmError::from)
}
