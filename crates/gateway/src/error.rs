use thiserror::Error;

use vaultgate_core::{BatchId, LogicalId, ParseError, SubjectId};
use vaultgate_provider::DeliveryError;
use vaultgate_state::StateError;

use crate::broadcast::BroadcastSummary;

/// Errors surfaced synchronously to the caller of a request-path operation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No valid token was presented. The caller should request a new one.
    #[error("access token for {subject} is missing, invalid or expired; request a new token")]
    Unauthorized { subject: SubjectId },

    /// The subject may not run administrative operations.
    #[error("{subject} is not an administrator")]
    Forbidden { subject: SubjectId },

    #[error("{subject} is banned")]
    Banned { subject: SubjectId },

    #[error("content not found: {0}")]
    ContentNotFound(LogicalId),

    #[error("batch not found: {0}")]
    BatchNotFound(BatchId),

    #[error("invalid link: {0}")]
    InvalidLink(#[from] ParseError),

    /// A single-item delivery did not go through.
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Whether the error is an authorization failure the subject can fix by
    /// requesting a fresh token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Whether the referenced content or batch does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ContentNotFound(_) | Self::BatchNotFound(_))
    }
}

/// Dispatcher-level failures. Per-recipient failures never show up here;
/// they are counted in the [`BroadcastSummary`].
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// The pre-flight health check failed.
    #[error("platform unreachable: {0}")]
    Unreachable(DeliveryError),

    /// A send reported a fatal condition; the run stopped after its wave.
    #[error("broadcast aborted: {error}")]
    Fatal {
        error: DeliveryError,
        summary: Box<BroadcastSummary>,
    },

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("broadcast task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_and_resolution_are_distinct() {
        let unauthorized = GatewayError::Unauthorized {
            subject: SubjectId::new("1"),
        };
        let missing = GatewayError::ContentNotFound(LogicalId::new("abc"));
        assert!(unauthorized.is_unauthorized());
        assert!(!unauthorized.is_not_found());
        assert!(missing.is_not_found());
        assert!(!missing.is_unauthorized());
        assert!(unauthorized.to_string().contains("request a new token"));
    }
}
