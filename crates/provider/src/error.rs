use std::time::Duration;

use thiserror::Error;

/// Errors a delivery gateway can report for a single platform call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The platform asked us to slow down. Not a failure.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The recipient can never be reached (blocked the bot, deactivated,
    /// unknown chat).
    #[error("recipient unreachable: {0}")]
    Recipient(String),

    /// The referenced message does not exist (anymore).
    #[error("message not found: {0}")]
    NotFound(String),

    /// The platform rejected our credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The call did not complete within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A network or transport-level error occurred.
    #[error("connection error: {0}")]
    Connection(String),

    /// Any other error reported by the platform API.
    #[error("api error {code}: {description}")]
    Api { code: u16, description: String },

    /// The gateway was given invalid configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// How the dispatcher must treat a failed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Pause the whole dispatcher for the given duration, then retry.
    RateLimited(Duration),
    /// Drop the recipient for good.
    Permanent,
    /// Retry a bounded number of times.
    Transient,
    /// Nothing else will succeed either; abort the run.
    Fatal,
}

impl DeliveryError {
    #[must_use]
    pub fn classify(&self) -> FailureClass {
        match self {
            Self::RateLimited { retry_after } => FailureClass::RateLimited(*retry_after),
            Self::Recipient(_) => FailureClass::Permanent,
            Self::NotFound(_) | Self::Unauthorized(_) | Self::Configuration(_) => {
                FailureClass::Fatal
            }
            Self::Timeout(_) | Self::Connection(_) | Self::Api { .. } | Self::Serialization(_) => {
                FailureClass::Transient
            }
        }
    }

    /// Returns `true` if the same call may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classify(),
            FailureClass::RateLimited(_) | FailureClass::Transient
        )
    }
}
