use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair held by a token manager.
///
/// `expires_at` is always computed locally when the pair is issued or
/// refreshed.
///
/// # Example
/// ```no_run
/// use zcrm_auth::auth::TokenPair;
///
/// let pair = TokenPair::issued("access", "refresh", "Bearer", 3600);
/// assert!(!pair.expires_within(chrono::Duration::minutes(5)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: Option<String>,
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

impl TokenPair {
    /// Build a pair issued now that expires `lifetime_secs` from now.
    pub fn issued(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_type: impl Into<String>,
        lifetime_secs: u64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: Some(token_type.into()),
            expires_in: lifetime_secs,
            expires_at: expiry_from_now(lifetime_secs),
        }
    }

    /// True when the access token expires within `window` from now.
    pub fn expires_within(&self, window: Duration) -> bool {
        self.expires_at - Utc::now() < window
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Swap in a refreshed access token. The refresh token is never touched.
    pub(crate) fn apply_refresh(&mut self, access_token: String, lifetime_secs: u64) {
        self.access_token = access_token;
        self.expires_in = lifetime_secs;
        self.expires_at = expiry_from_now(lifetime_secs);
    }
}

/// Token endpoint payload.
///
/// Every field is optional: a 200 response without tokens means the grant
/// was rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    /// Seconds variant some Zoho data centers send next to a millisecond `expires_in`.
    pub expires_in_sec: Option<u64>,
    pub token_type: Option<String>,
    pub error: Option<String>,
}

// Ten years; keeps the chrono arithmetic in range for absurd server values.
const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

pub(crate) fn expiry_from_now(lifetime_secs: u64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(lifetime_secs.min(MAX_LIFETIME_SECS) as i64)
}
