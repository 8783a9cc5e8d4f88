use thiserror::Error;

use crate::error::ZcrmError;

/// Errors raised by the token lifecycle.
///
/// Payloads are plain strings so the error can be cloned into every waiter
/// of a [`CompletionGate`](super::gate::CompletionGate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Access token missing")]
    MissingAccessToken,
    #[error("Refresh token missing")]
    MissingRefreshToken,
    #[error("Invalid authorization code")]
    InvalidAuthorizationCode,
    #[error("Corrupted token cache file {name}: {message}")]
    CorruptedCacheFile { name: String, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<ZcrmError> for AuthError {
    fn from(error: ZcrmError) -> Self {
        match error {
            ZcrmError::Authentication(inner) => inner,
            ZcrmError::Network(err) => Self::Network(err.to_string()),
            other => Self::InvalidResponse(other.to_string()),
        }
    }
}
