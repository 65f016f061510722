use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::ids;
use crate::types::SubjectId;

/// Default validity window of an access token, in hours.
pub const DEFAULT_TOKEN_VALIDITY_HOURS: i64 = 24;

/// A time-bounded credential bound to exactly one subject.
///
/// Tokens are never mutated. A newer token for the same subject replaces the
/// stored one; an old token simply stops matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub subject: SubjectId,
    pub secret: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Mint a new token for `subject` with a fresh random secret.
    ///
    /// A non-positive `validity` is clamped to one second so that
    /// `expires_at > issued_at` always holds.
    #[must_use]
    pub fn mint(subject: SubjectId, issued_at: DateTime<Utc>, validity: Duration) -> Self {
        let validity = validity.max(Duration::seconds(1));
        Self {
            subject,
            secret: ids::random_secret(),
            issued_at,
            expires_at: issued_at + validity,
        }
    }

    /// Whether the token is still live at `now`.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Constant-time comparison against a presented secret.
    #[must_use]
    pub fn secret_matches(&self, presented: &str) -> bool {
        self.secret.as_bytes().ct_eq(presented.as_bytes()).into()
    }

    /// Full validation: matching secret and not yet expired.
    #[must_use]
    pub fn accepts(&self, presented: &str, now: DateTime<Utc>) -> bool {
        self.secret_matches(presented) && self.is_live_at(now)
    }
}
