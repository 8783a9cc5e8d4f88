use std::fmt;
use std::time::Duration;

use bon::Builder;

use super::error::AuthError;

/// Shortest value accepted for any credential field.
pub const MIN_CREDENTIAL_LEN: usize = 5;

/// Refresh interval used when no usable lifetime is configured.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;
/// Lifetimes at or below this keep the default interval.
pub const MIN_TOKEN_LIFETIME_SECS: u64 = 300;
/// Refresh this long before the token expires.
pub const REFRESH_MARGIN_SECS: u64 = 180;
const DEFAULT_LEEWAY_NANOS: u64 = 30;

/// OAuth client credentials plus the one-time authorization code.
///
/// # Example
/// ```
/// use zcrm_auth::auth::Credentials;
///
/// let credentials = Credentials::builder()
///     .client_id("1000.CLIENT")
///     .client_secret("secret-value")
///     .redirect_uri("https://www.example.com")
///     .auth_code("1000.code")
///     .build();
/// assert!(credentials.validate().is_ok());
/// ```
#[derive(Clone, Builder, PartialEq, Eq)]
pub struct Credentials {
    #[builder(into)]
    pub client_id: String,
    #[builder(into)]
    pub client_secret: String,
    #[builder(into)]
    pub redirect_uri: String,
    #[builder(into)]
    pub auth_code: String,
}

impl Credentials {
    /// Reject empty fields and fields shorter than [`MIN_CREDENTIAL_LEN`].
    pub fn validate(&self) -> Result<(), AuthError> {
        let fields = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
            ("auth_code", &self.auth_code),
        ];
        for (name, value) in fields {
            if value.is_empty() || value.chars().count() < MIN_CREDENTIAL_LEN {
                return Err(AuthError::InvalidCredentials(format!(
                    "{name} must be at least {MIN_CREDENTIAL_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_code", &"<redacted>")
            .finish()
    }
}

/// When the periodic refresh fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    /// Token lifetime the schedule was derived from.
    pub lifetime: Duration,
    pub interval: Duration,
    /// Scheduling slack, `(interval_secs * 30) / 5` nanoseconds.
    pub leeway: Duration,
}

impl RefreshSchedule {
    /// Derive the schedule for a configured token lifetime.
    ///
    /// Lifetimes above five minutes refresh three minutes early; anything
    /// else keeps the hourly default.
    pub fn from_lifetime(lifetime_secs: Option<u64>) -> Self {
        match lifetime_secs {
            Some(lifetime) if lifetime > MIN_TOKEN_LIFETIME_SECS => {
                let interval = lifetime - REFRESH_MARGIN_SECS;
                Self {
                    lifetime: Duration::from_secs(lifetime),
                    interval: Duration::from_secs(interval),
                    leeway: Duration::from_nanos(interval.saturating_mul(30) / 5),
                }
            }
            _ => Self::default(),
        }
    }

    /// Keep the lifetime but fire every `interval` instead.
    pub fn with_interval(self, interval: Duration) -> Self {
        let secs = interval.as_secs();
        Self {
            interval,
            leeway: Duration::from_nanos(secs.saturating_mul(30) / 5),
            ..self
        }
    }

    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime.as_secs()
    }
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            leeway: Duration::from_nanos(DEFAULT_LEEWAY_NANOS),
        }
    }
}
