//! Error types for zcrm-auth.

use thiserror::Error;

use crate::auth::AuthError;

/// Primary error type for request building and CRM API calls.
#[derive(Error, Debug)]
pub enum ZcrmError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request body is empty")]
    EmptyRequestBody,

    #[error("Header name or value is empty")]
    EmptyHeader,

    #[error("Invalid HTTP method selection: {0}")]
    InvalidMethodSelection(String),

    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ZcrmError {
    /// Create an API error from a status code and response body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether the error came from an authorization failure.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 401,
            Self::Authentication(_) => true,
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ZcrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_401_is_unauthorized() {
        assert!(ZcrmError::api(401, "INVALID_TOKEN").is_unauthorized());
        assert!(!ZcrmError::api(500, "boom").is_unauthorized());
    }

    #[test]
    fn auth_errors_convert_and_count_as_unauthorized() {
        let err: ZcrmError = AuthError::MissingAccessToken.into();
        assert!(err.is_unauthorized());
        assert_eq!(
            err.to_string(),
            "Authentication error: Access token missing"
        );
    }

    #[test]
    fn validation_errors_are_not_unauthorized() {
        assert!(!ZcrmError::EmptyHeader.is_unauthorized());
        assert!(!ZcrmError::InvalidUrl("::".into()).is_unauthorized());
    }
}
