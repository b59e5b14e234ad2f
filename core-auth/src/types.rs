use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Bearer token issued by the catalog's token endpoint.
///
/// # Examples
///
/// ```
/// use core_auth::AccessToken;
/// use chrono::Utc;
///
/// let token = AccessToken::new("abc".to_string(), 3600, Utc::now());
/// assert!(!token.is_expired(Utc::now()));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Seconds before `expires_at` at which the token is treated as stale.
    pub const EXPIRY_SKEW_SECONDS: i64 = 60;

    pub fn new(value: String, expires_in: i64, issued_at: DateTime<Utc>) -> Self {
        Self {
            value,
            expires_at: issued_at + Duration::seconds(expires_in),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::seconds(Self::EXPIRY_SKEW_SECONDS)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
