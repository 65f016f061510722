//! A single-process engine wired to in-memory state, a manual clock and a
//! recording gateway.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use vaultgate_core::{
    BatchId, Clock, Location, LogicalId, ManualClock, PrivilegeSource, StaticPrivileges, SubjectId,
};
use vaultgate_executor::ExecutorConfig;
use vaultgate_gateway::{BroadcastOptions, Vaultgate};
use vaultgate_provider::DynGateway;
use vaultgate_state::StateStore;
use vaultgate_state_memory::MemoryStateStore;

use crate::error::SimulationError;
use crate::provider::RecordingGateway;

/// Subject id of the administrator every harness is configured with.
pub const ADMIN: &str = "1";

/// Chat imported content is relocated into.
pub const STORAGE_CHAT: &str = "-1001";

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_717_243_200, 0)
        .single()
        .unwrap_or_default()
}

pub struct SimulationHarness {
    vaultgate: Vaultgate,
    gateway: Arc<RecordingGateway>,
    clock: Arc<ManualClock>,
    state: Arc<dyn StateStore>,
}

impl SimulationHarness {
    pub fn builder() -> SimulationHarnessBuilder {
        SimulationHarnessBuilder::default()
    }

    /// A harness with default settings.
    pub fn start() -> Result<Self, SimulationError> {
        Self::builder().build()
    }

    pub fn vaultgate(&self) -> &Vaultgate {
        &self.vaultgate
    }

    pub fn gateway(&self) -> &Arc<RecordingGateway> {
        &self.gateway
    }

    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    pub fn state(&self) -> &Arc<dyn StateStore> {
        &self.state
    }

    pub fn admin(&self) -> SubjectId {
        SubjectId::new(ADMIN)
    }

    /// Move the wall clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }

    /// Register each subject as a recipient.
    pub async fn register_recipients(&self, subjects: &[&str]) -> Result<(), SimulationError> {
        for subject in subjects {
            self.vaultgate
                .recipients()
                .register(&SubjectId::new(*subject))
                .await
                .map_err(vaultgate_gateway::GatewayError::from)?;
        }
        Ok(())
    }

    /// Import message `message_id` of chat `"1"` as the administrator.
    pub async fn store(&self, message_id: i64) -> Result<LogicalId, SimulationError> {
        let stored = self
            .vaultgate
            .store_content(&self.admin(), &Location::new("1", message_id), None)
            .await?;
        Ok(stored.reference.logical_id)
    }

    /// Import messages as one batch, in order.
    pub async fn store_batch(&self, message_ids: &[i64]) -> Result<BatchId, SimulationError> {
        let admin = self.admin();
        let batch = self.vaultgate.open_batch(&admin)?;
        for id in message_ids {
            self.vaultgate
                .store_content(&admin, &Location::new("1", *id), Some(&batch))
                .await?;
        }
        Ok(batch)
    }
}

/// Builder for [`SimulationHarness`].
#[derive(Default)]
pub struct SimulationHarnessBuilder {
    exempt: Vec<SubjectId>,
    auto_delete: Option<Duration>,
    broadcast: Option<BroadcastOptions>,
    executor: Option<ExecutorConfig>,
    gateway: Option<RecordingGateway>,
    start: Option<DateTime<Utc>>,
}

impl SimulationHarnessBuilder {
    /// Subjects that skip token checks without being administrators.
    #[must_use]
    pub fn exempt(mut self, subject: &str) -> Self {
        self.exempt.push(SubjectId::new(subject));
        self
    }

    #[must_use]
    pub fn auto_delete(mut self, after: Duration) -> Self {
        self.auto_delete = Some(after);
        self
    }

    #[must_use]
    pub fn broadcast_options(mut self, options: BroadcastOptions) -> Self {
        self.broadcast = Some(options);
        self
    }

    #[must_use]
    pub fn executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor = Some(config);
        self
    }

    /// Use a preconfigured recording gateway.
    #[must_use]
    pub fn gateway(mut self, gateway: RecordingGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    #[must_use]
    pub fn start_at(mut self, at: DateTime<Utc>) -> Self {
        self.start = Some(at);
        self
    }

    pub fn build(self) -> Result<SimulationHarness, SimulationError> {
        let gateway = Arc::new(
            self.gateway
                .unwrap_or_else(|| RecordingGateway::new("recording")),
        );
        let clock = Arc::new(ManualClock::new(self.start.unwrap_or_else(epoch)));
        let state: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let privileges: Arc<dyn PrivilegeSource> =
            Arc::new(StaticPrivileges::new([SubjectId::new(ADMIN)], self.exempt));

        let mut builder = Vaultgate::builder()
            .namespace("sim")
            .state(Arc::clone(&state))
            .gateway(Arc::clone(&gateway) as Arc<dyn DynGateway>)
            .clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .privileges(privileges)
            .storage_chat(STORAGE_CHAT)
            .bot_username("vaultgate_sim_bot");
        if let Some(after) = self.auto_delete {
            builder = builder.auto_delete(after);
        }
        if let Some(options) = self.broadcast {
            builder = builder.broadcast_options(options);
        }
        if let Some(config) = self.executor {
            builder = builder.executor_config(config);
        }

        Ok(SimulationHarness {
            vaultgate: builder.build()?,
            gateway,
            clock,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_goes_through_storage_chat() {
        let harness = SimulationHarness::start().unwrap();
        let id = harness.store(7).await.unwrap();
        let location = harness.vaultgate().content().resolve(&id).await.unwrap();
        assert_eq!(location.chat_id, STORAGE_CHAT);
    }

    #[tokio::test]
    async fn clock_starts_at_fixed_epoch() {
        let harness = SimulationHarness::start().unwrap();
        assert_eq!(harness.clock().now(), epoch());
        harness.advance(chrono::Duration::hours(1));
        assert_eq!(harness.clock().now(), epoch() + chrono::Duration::hours(1));
    }
}
