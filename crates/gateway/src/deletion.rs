//! Deferred deletion of delivered copies.
//!
//! Obligations live under the delivered location's key, so re-scheduling a
//! location replaces its obligation. Each is indexed by `fire_at` in the
//! store's due-time index and claimed before the delete call so concurrent
//! pollers never delete twice.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vaultgate_core::{Clock, DeletionObligation, Location, Namespace};
use vaultgate_provider::{DeliveryError, DynGateway};
use vaultgate_state::{KeyKind, StateError, StateKey, StateStore};

use crate::metrics::GatewayMetrics;

/// How long a poller holds an obligation before another may take it over.
const CLAIM_TTL: Duration = Duration::from_secs(60);

/// Outcome counts of one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Obligations found due.
    pub due: usize,
    pub deleted: usize,
    /// Deletions the platform rejected. These are resolved all the same.
    pub failed: usize,
    /// Obligations claimed by another poller or rescheduled into the future.
    pub skipped: usize,
}

pub struct DeletionScheduler {
    state: Arc<dyn StateStore>,
    namespace: Namespace,
    clock: Arc<dyn Clock>,
    gateway: Arc<dyn DynGateway>,
    metrics: Arc<GatewayMetrics>,
    delete_timeout: Duration,
}

impl DeletionScheduler {
    pub fn new(
        state: Arc<dyn StateStore>,
        namespace: Namespace,
        clock: Arc<dyn Clock>,
        gateway: Arc<dyn DynGateway>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            state,
            namespace,
            clock,
            gateway,
            metrics,
            delete_timeout: Duration::from_secs(30),
        }
    }

    /// Bound a single delete call.
    #[must_use]
    pub fn with_delete_timeout(mut self, timeout: Duration) -> Self {
        self.delete_timeout = timeout;
        self
    }

    fn key(&self, location: &Location) -> StateKey {
        StateKey::new(self.namespace.clone(), KeyKind::Deletion, location.to_string())
    }

    fn claim_key(&self, key: &StateKey) -> StateKey {
        StateKey::new(
            self.namespace.clone(),
            KeyKind::Claim,
            format!("deletion:{}", key.id),
        )
    }

    /// Record that `location` must be deleted once `delay` has passed.
    pub async fn schedule(
        &self,
        location: Location,
        delay: Duration,
    ) -> Result<DeletionObligation, StateError> {
        let delay =
            chrono::Duration::from_std(delay).map_err(|e| StateError::Backend(e.to_string()))?;
        let obligation = DeletionObligation::pending(location, self.clock.now() + delay);
        let key = self.key(&obligation.location);
        let body = serde_json::to_string(&obligation)
            .map_err(|e| StateError::Serialization(e.to_string()))?;
        self.state.set(&key, &body, None).await?;
        self.state
            .index_timeout(&key, obligation.fire_at.timestamp_millis())
            .await?;
        self.metrics.increment_deletions_scheduled();
        debug!(location = %obligation.location, fire_at = %obligation.fire_at, "deletion scheduled");
        Ok(obligation)
    }

    /// Drop a pending obligation. Returns `true` if one existed.
    pub async fn cancel(&self, location: &Location) -> Result<bool, StateError> {
        let key = self.key(location);
        self.state.remove_timeout_index(&key).await?;
        self.state.delete(&key).await
    }

    pub async fn get(&self, location: &Location) -> Result<Option<DeletionObligation>, StateError> {
        self.load(&self.key(location)).await
    }

    async fn load(&self, key: &StateKey) -> Result<Option<DeletionObligation>, StateError> {
        let Some(raw) = self.state.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StateError::Serialization(e.to_string()))
    }

    /// Pending obligations ordered by due time.
    pub async fn pending(&self) -> Result<Vec<DeletionObligation>, StateError> {
        let entries = self
            .state
            .scan_keys(&self.namespace, KeyKind::Deletion, None)
            .await?;
        let mut obligations = entries
            .into_iter()
            .map(|(_, raw)| {
                serde_json::from_str::<DeletionObligation>(&raw)
                    .map_err(|e| StateError::Serialization(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        obligations.sort_by_key(|o| o.fire_at);
        Ok(obligations)
    }

    /// Run one poll: delete every due copy and resolve its obligation.
    pub async fn tick(&self) -> Result<TickReport, StateError> {
        let now = self.clock.now();
        let expired = self
            .state
            .get_expired_timeouts(KeyKind::Deletion, now.timestamp_millis())
            .await?;

        let mut report = TickReport::default();
        for canonical in expired {
            let Some(key) = StateKey::parse_canonical(&canonical) else {
                continue;
            };
            if key.namespace != self.namespace {
                continue;
            }
            report.due += 1;

            let claimed = self
                .state
                .check_and_set(&self.claim_key(&key), "claimed", Some(CLAIM_TTL))
                .await?;
            if !claimed {
                debug!(key = %canonical, "deletion already claimed by another poller");
                report.skipped += 1;
                continue;
            }

            let obligation = match self.load(&key).await {
                Ok(Some(obligation)) => obligation,
                Ok(None) => {
                    // Cancelled after the index was read.
                    self.state.remove_timeout_index(&key).await?;
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(key = %canonical, error = %e, "unreadable deletion obligation, dropping");
                    self.resolve(&key).await?;
                    report.skipped += 1;
                    continue;
                }
            };

            if !obligation.is_due(now) {
                self.state.delete(&self.claim_key(&key)).await?;
                report.skipped += 1;
                continue;
            }

            match self.execute(&obligation).await {
                Ok(()) => report.deleted += 1,
                Err(_) => report.failed += 1,
            }
            self.resolve_executed(&key, &obligation).await?;
            self.state.delete(&self.claim_key(&key)).await?;
        }

        if report.due > 0 {
            info!(
                due = report.due,
                deleted = report.deleted,
                failed = report.failed,
                "deletion poll finished"
            );
        }
        Ok(report)
    }

    async fn execute(&self, obligation: &DeletionObligation) -> Result<(), DeliveryError> {
        let result = match tokio::time::timeout(
            self.delete_timeout,
            self.gateway.delete(&obligation.location),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(DeliveryError::Timeout(self.delete_timeout)),
        };
        match &result {
            Ok(()) => {
                self.metrics.increment_deletions_executed();
                debug!(location = %obligation.location, "delivered copy deleted");
            }
            Err(e) => {
                self.metrics.increment_deletions_failed();
                debug!(location = %obligation.location, error = %e, "deletion failed, giving up");
            }
        }
        result
    }

    /// Discard the executed obligation. A location re-scheduled while the
    /// delete call was in flight carries a different `fire_at` and stays
    /// pending under its new due time.
    async fn resolve_executed(
        &self,
        key: &StateKey,
        executed: &DeletionObligation,
    ) -> Result<(), StateError> {
        if let Ok(Some(current)) = self.load(key).await
            && current.fire_at != executed.fire_at
        {
            debug!(
                location = %current.location,
                fire_at = %current.fire_at,
                "location re-scheduled during deletion, keeping new obligation"
            );
            return Ok(());
        }
        self.resolve(key).await
    }

    async fn resolve(&self, key: &StateKey) -> Result<(), StateError> {
        self.state.delete(key).await?;
        self.state.remove_timeout_index(key).await
    }

    /// Poll every `interval` until `shutdown` fires.
    pub async fn run_forever(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_ms = interval.as_millis(), "deletion scheduler started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("deletion scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "deletion poll failed");
                    }
                }
            }
        }
    }
}
