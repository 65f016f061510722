use std::sync::atomic::{AtomicI64, Ordering};

use tracing::info;
use vaultgate_core::{Location, SubjectId};

use crate::error::DeliveryError;
use crate::gateway::Gateway;

/// A gateway that logs every call and fabricates message coordinates
/// without performing any external I/O.
///
/// Useful for dry runs and local development.
pub struct LogGateway {
    name: String,
    next_message_id: AtomicI64,
}

impl LogGateway {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_message_id: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> i64 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Gateway for LogGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(
        &self,
        source: &Location,
        recipient: &SubjectId,
    ) -> Result<Location, DeliveryError> {
        let copy = Location::new(recipient.as_str(), self.next_id());
        info!(gateway = %self.name, %source, %recipient, %copy, "log gateway delivered message");
        Ok(copy)
    }

    async fn delete(&self, location: &Location) -> Result<(), DeliveryError> {
        info!(gateway = %self.name, %location, "log gateway deleted message");
        Ok(())
    }

    async fn relocate(
        &self,
        source: &Location,
        destination_chat: &str,
    ) -> Result<Location, DeliveryError> {
        let stored = Location::new(destination_chat, self.next_id());
        info!(gateway = %self.name, %source, %stored, "log gateway relocated message");
        Ok(stored)
    }

    #[allow(clippy::unused_async)]
    async fn health_check(&self) -> Result<(), DeliveryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_gateway_name() {
        let gateway = LogGateway::new("dry-run");
        assert_eq!(Gateway::name(&gateway), "dry-run");
    }

    #[tokio::test]
    async fn fabricated_ids_are_unique() {
        let gateway = LogGateway::new("dry-run");
        let source = Location::new("store", 1);
        let a = gateway.deliver(&source, &SubjectId::new("1")).await.unwrap();
        let b = gateway.deliver(&source, &SubjectId::new("1")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.chat_id, "1");
    }

    #[tokio::test]
    async fn relocate_targets_destination_chat() {
        let gateway = LogGateway::new("dry-run");
        let stored = gateway
            .relocate(&Location::new("admin", 3), "-100store")
            .await
            .unwrap();
        assert_eq!(stored.chat_id, "-100store");
        gateway.delete(&stored).await.unwrap();
        gateway.health_check().await.unwrap();
    }
}
