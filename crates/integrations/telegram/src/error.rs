use std::time::Duration;

use thiserror::Error;
use vaultgate_provider::DeliveryError;

/// Errors specific to the Telegram gateway.
///
/// These are internal errors that get converted into [`DeliveryError`] at
/// the public API boundary.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// An HTTP-level transport error occurred.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The Bot API answered with `ok: false`.
    #[error("Telegram API error {code}: {description}")]
    Api { code: u16, description: String },

    /// The Bot API returned HTTP 429 / `retry_after`.
    #[error("rate limited by Telegram, retry after {0:?}")]
    RateLimited(Duration),

    /// The response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

const RECIPIENT_GONE: &[&str] = &[
    "chat not found",
    "user not found",
    "peer_id_invalid",
    "user is deactivated",
    "bot was blocked",
    "bot was kicked",
    "bot can't initiate conversation",
];

const MESSAGE_GONE: &[&str] = &[
    "message to copy not found",
    "message to forward not found",
    "message to delete not found",
    "message not found",
];

impl From<TelegramError> for DeliveryError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::Http(e) => DeliveryError::Connection(e.to_string()),
            TelegramError::Timeout(d) => DeliveryError::Timeout(d),
            TelegramError::RateLimited(retry_after) => DeliveryError::RateLimited { retry_after },
            TelegramError::InvalidResponse(msg) => DeliveryError::Serialization(msg),
            TelegramError::Api { code, description } => classify_api_error(code, description),
        }
    }
}

fn classify_api_error(code: u16, description: String) -> DeliveryError {
    let lowered = description.to_ascii_lowercase();
    match code {
        // A wrong token yields 404 on every method path.
        401 | 404 => DeliveryError::Unauthorized(description),
        403 => DeliveryError::Recipient(description),
        400 if MESSAGE_GONE.iter().any(|p| lowered.contains(p)) => {
            DeliveryError::NotFound(description)
        }
        400 if RECIPIENT_GONE.iter().any(|p| lowered.contains(p)) => {
            DeliveryError::Recipient(description)
        }
        500.. => DeliveryError::Connection(format!("HTTP {code}: {description}")),
        _ => DeliveryError::Api { code, description },
    }
}

#[cfg(test)]
mod tests {
    use vaultgate_provider::FailureClass;

    use super::*;

    fn api(code: u16, description: &str) -> DeliveryError {
        TelegramError::Api {
            code,
            description: description.into(),
        }
        .into()
    }

    #[test]
    fn rate_limited_keeps_retry_after() {
        let err: DeliveryError = TelegramError::RateLimited(Duration::from_secs(7)).into();
        assert_eq!(err.classify(), FailureClass::RateLimited(Duration::from_secs(7)));
    }

    #[test]
    fn blocked_user_is_permanent() {
        let err = api(403, "Forbidden: bot was blocked by the user");
        assert_eq!(err.classify(), FailureClass::Permanent);
        let err = api(400, "Bad Request: chat not found");
        assert_eq!(err.classify(), FailureClass::Permanent);
    }

    #[test]
    fn missing_source_message_is_not_found() {
        let err = api(400, "Bad Request: message to copy not found");
        assert!(matches!(err, DeliveryError::NotFound(_)));
    }

    #[test]
    fn bad_token_is_fatal() {
        assert_eq!(api(401, "Unauthorized").classify(), FailureClass::Fatal);
        assert_eq!(api(404, "Not Found").classify(), FailureClass::Fatal);
    }

    #[test]
    fn server_errors_are_transient() {
        assert_eq!(api(502, "Bad Gateway").classify(), FailureClass::Transient);
        assert_eq!(
            api(400, "Bad Request: message is too long").classify(),
            FailureClass::Transient
        );
    }

    #[test]
    fn timeout_maps_to_timeout() {
        let err: DeliveryError = TelegramError::Timeout(Duration::from_secs(30)).into();
        assert_eq!(err, DeliveryError::Timeout(Duration::from_secs(30)));
    }
}
