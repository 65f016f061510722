use async_trait::async_trait;
use vaultgate_core::{Location, SubjectId};

use crate::error::DeliveryError;

/// Messaging platform client, with native `async fn`.
///
/// This trait is **not** object-safe. Every `Gateway` automatically
/// implements [`DynGateway`] for use behind `Arc<dyn DynGateway>`.
pub trait Gateway: Send + Sync {
    /// Returns the unique name of this gateway.
    fn name(&self) -> &str;

    /// Copy the message at `source` into the recipient's chat and return the
    /// coordinate of the delivered copy.
    fn deliver(
        &self,
        source: &Location,
        recipient: &SubjectId,
    ) -> impl std::future::Future<Output = Result<Location, DeliveryError>> + Send;

    /// Delete a message.
    fn delete(
        &self,
        location: &Location,
    ) -> impl std::future::Future<Output = Result<(), DeliveryError>> + Send;

    /// Copy the message at `source` into `destination_chat` (the backing
    /// store) and return its new coordinate.
    fn relocate(
        &self,
        source: &Location,
        destination_chat: &str,
    ) -> impl std::future::Future<Output = Result<Location, DeliveryError>> + Send;

    /// Verify the platform is reachable and our credentials are accepted.
    fn health_check(&self) -> impl std::future::Future<Output = Result<(), DeliveryError>> + Send;
}

/// Object-safe gateway trait for use behind `Arc<dyn DynGateway>`.
///
/// Implement [`Gateway`] and rely on the blanket implementation instead of
/// implementing this directly.
#[async_trait]
pub trait DynGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(
        &self,
        source: &Location,
        recipient: &SubjectId,
    ) -> Result<Location, DeliveryError>;

    async fn delete(&self, location: &Location) -> Result<(), DeliveryError>;

    async fn relocate(
        &self,
        source: &Location,
        destination_chat: &str,
    ) -> Result<Location, DeliveryError>;

    async fn health_check(&self) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<T: Gateway + Sync> DynGateway for T {
    fn name(&self) -> &str {
        Gateway::name(self)
    }

    async fn deliver(
        &self,
        source: &Location,
        recipient: &SubjectId,
    ) -> Result<Location, DeliveryError> {
        Gateway::deliver(self, source, recipient).await
    }

    async fn delete(&self, location: &Location) -> Result<(), DeliveryError> {
        Gateway::delete(self, location).await
    }

    async fn relocate(
        &self,
        source: &Location,
        destination_chat: &str,
    ) -> Result<Location, DeliveryError> {
        Gateway::relocate(self, source, destination_chat).await
    }

    async fn health_check(&self) -> Result<(), DeliveryError> {
        Gateway::health_check(self).await
    }
}
