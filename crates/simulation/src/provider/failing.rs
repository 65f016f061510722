use std::time::Duration;

use vaultgate_core::{Location, SubjectId};
use vaultgate_provider::{DeliveryError, Gateway};

/// The kind of failure a [`FailingGateway`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Flood control with the given retry-after.
    RateLimited(Duration),
    /// Recipient blocked the bot or no longer exists.
    Permanent,
    /// Network trouble.
    Transient,
    /// Credentials rejected. Health checks fail too.
    Unauthorized,
    /// The source message vanished.
    SourceMissing,
}

impl FailureType {
    pub fn to_error(self) -> DeliveryError {
        match self {
            Self::RateLimited(retry_after) => DeliveryError::RateLimited { retry_after },
            Self::Permanent => DeliveryError::Recipient("Forbidden: bot was blocked by the user".into()),
            Self::Transient => DeliveryError::Connection("connection reset by peer".into()),
            Self::Unauthorized => DeliveryError::Unauthorized("Unauthorized".into()),
            Self::SourceMissing => {
                DeliveryError::NotFound("Bad Request: message to copy not found".into())
            }
        }
    }
}

/// A gateway whose every delivery, deletion and relocation fails the same
/// way.
#[derive(Debug, Clone)]
pub struct FailingGateway {
    name: String,
    failure: FailureType,
}

impl FailingGateway {
    pub fn new(name: impl Into<String>, failure: FailureType) -> Self {
        Self {
            name: name.into(),
            failure,
        }
    }

    pub fn failure(&self) -> FailureType {
        self.failure
    }
}

impl Gateway for FailingGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, _source: &Location, _recipient: &SubjectId) -> Result<Location, DeliveryError> {
        Err(self.failure.to_error())
    }

    async fn delete(&self, _location: &Location) -> Result<(), DeliveryError> {
        Err(self.failure.to_error())
    }

    async fn relocate(&self, _source: &Location, _destination_chat: &str) -> Result<Location, DeliveryError> {
        Err(self.failure.to_error())
    }

    async fn health_check(&self) -> Result<(), DeliveryError> {
        match self.failure {
            FailureType::Unauthorized => Err(self.failure.to_error()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultgate_provider::FailureClass;

    #[test]
    fn failure_types_classify_as_expected() {
        assert!(matches!(
            FailureType::RateLimited(Duration::from_secs(3)).to_error().classify(),
            FailureClass::RateLimited(d) if d == Duration::from_secs(3)
        ));
        assert_eq!(FailureType::Permanent.to_error().classify(), FailureClass::Permanent);
        assert_eq!(FailureType::Transient.to_error().classify(), FailureClass::Transient);
        assert_eq!(FailureType::Unauthorized.to_error().classify(), FailureClass::Fatal);
        assert_eq!(FailureType::SourceMissing.to_error().classify(), FailureClass::Fatal);
    }

    #[tokio::test]
    async fn health_fails_only_when_unauthorized() {
        let gw = FailingGateway::new("down", FailureType::Unauthorized);
        assert!(Gateway::health_check(&gw).await.is_err());
        let gw = FailingGateway::new("flaky", FailureType::Transient);
        assert!(Gateway::health_check(&gw).await.is_ok());
        assert!(
            Gateway::deliver(&gw, &Location::new("1", 1), &SubjectId::new("a"))
                .await
                .is_err()
        );
    }
}
