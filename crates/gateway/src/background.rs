//! Periodic housekeeping: deferred deletions and the token sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::access::AccessTokenManager;
use crate::deletion::DeletionScheduler;
use crate::metrics::GatewayMetrics;

/// Intervals and toggles of the background loop.
#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    /// How often due deletions are polled (default: 60 seconds).
    pub deletion_poll_interval: Duration,
    /// Whether deferred deletions are processed (default: true).
    pub enable_deletions: bool,
    /// How often expired tokens are swept (default: 1 hour).
    pub token_sweep_interval: Duration,
    /// Whether the token sweep runs (default: false).
    pub enable_token_sweep: bool,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            deletion_poll_interval: Duration::from_secs(60),
            enable_deletions: true,
            token_sweep_interval: Duration::from_secs(3600),
            enable_token_sweep: false,
        }
    }
}

/// Drives the deletion scheduler and token sweep on independent intervals
/// until a shutdown signal arrives.
pub struct BackgroundProcessor {
    config: BackgroundConfig,
    deletions: Option<Arc<DeletionScheduler>>,
    tokens: Option<Arc<AccessTokenManager>>,
    metrics: Arc<GatewayMetrics>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl BackgroundProcessor {
    pub fn config(&self) -> &BackgroundConfig {
        &self.config
    }

    pub async fn run(&mut self) {
        info!("background processor starting");

        let mut deletion_interval = interval(self.config.deletion_poll_interval);
        deletion_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep_interval = interval(self.config.token_sweep_interval);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let run_deletions = self.config.enable_deletions && self.deletions.is_some();
        let run_sweep = self.config.enable_token_sweep && self.tokens.is_some();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("background processor received shutdown signal");
                    break;
                }
                _ = deletion_interval.tick(), if run_deletions => {
                    self.process_deletions().await;
                }
                _ = sweep_interval.tick(), if run_sweep => {
                    self.sweep_tokens().await;
                }
            }
        }

        info!("background processor stopped");
    }

    async fn process_deletions(&self) {
        let Some(ref deletions) = self.deletions else {
            return;
        };
        match deletions.tick().await {
            Ok(report) => debug!(
                due = report.due,
                deleted = report.deleted,
                failed = report.failed,
                "deletion poll"
            ),
            Err(e) => error!(error = %e, "error processing deletions"),
        }
    }

    async fn sweep_tokens(&self) {
        let Some(ref tokens) = self.tokens else {
            return;
        };
        match tokens.sweep_expired().await {
            Ok(removed) => self.metrics.add_tokens_swept(removed as u64),
            Err(e) => error!(error = %e, "error sweeping expired tokens"),
        }
    }
}

/// Builder for [`BackgroundProcessor`].
#[derive(Default)]
pub struct BackgroundProcessorBuilder {
    config: BackgroundConfig,
    deletions: Option<Arc<DeletionScheduler>>,
    tokens: Option<Arc<AccessTokenManager>>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl BackgroundProcessorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: BackgroundConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn deletions(mut self, deletions: Arc<DeletionScheduler>) -> Self {
        self.deletions = Some(deletions);
        self
    }

    #[must_use]
    pub fn tokens(mut self, tokens: Arc<AccessTokenManager>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the processor together with its shutdown sender.
    pub fn build(self) -> Result<(BackgroundProcessor, mpsc::Sender<()>), &'static str> {
        let metrics = self.metrics.ok_or("metrics is required")?;
        if self.config.enable_deletions && self.deletions.is_none() {
            return Err("deletion scheduler is required when deletions are enabled");
        }
        if self.config.enable_token_sweep && self.tokens.is_none() {
            return Err("token manager is required when the token sweep is enabled");
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let processor = BackgroundProcessor {
            config: self.config,
            deletions: self.deletions,
            tokens: self.tokens,
            metrics,
            shutdown_rx,
        };
        Ok((processor, shutdown_tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestGateway, manual_clock, memory_store};
    use vaultgate_core::{Clock, Location, ManualClock, Namespace, StaticPrivileges, SubjectId};
    use vaultgate_provider::DynGateway;
    use vaultgate_state::StateStore;

    struct Parts {
        gateway: Arc<TestGateway>,
        clock: Arc<ManualClock>,
        deletions: Arc<DeletionScheduler>,
        tokens: Arc<AccessTokenManager>,
        metrics: Arc<GatewayMetrics>,
    }

    fn parts() -> Parts {
        let gateway = TestGateway::new();
        let clock = manual_clock();
        let state: Arc<dyn StateStore> = memory_store();
        let metrics = Arc::new(GatewayMetrics::default());
        let ns = Namespace::new("test");
        let deletions = Arc::new(DeletionScheduler::new(
            Arc::clone(&state),
            ns.clone(),
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&gateway) as Arc<dyn DynGateway>,
            Arc::clone(&metrics),
        ));
        let tokens = Arc::new(AccessTokenManager::new(
            state,
            ns,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::new(StaticPrivileges::default()),
            chrono::Duration::hours(24),
        ));
        Parts {
            gateway,
            clock,
            deletions,
            tokens,
            metrics,
        }
    }

    #[test]
    fn default_config() {
        let config = BackgroundConfig::default();
        assert_eq!(config.deletion_poll_interval, Duration::from_secs(60));
        assert!(config.enable_deletions);
        assert!(!config.enable_token_sweep);
    }

    #[test]
    fn builder_requires_metrics() {
        let result = BackgroundProcessorBuilder::new()
            .config(BackgroundConfig {
                enable_deletions: false,
                ..BackgroundConfig::default()
            })
            .build();
        assert_eq!(result.err(), Some("metrics is required"));
    }

    #[test]
    fn builder_requires_enabled_components() {
        let p = parts();
        let result = BackgroundProcessorBuilder::new().metrics(p.metrics).build();
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn processes_deletions_until_shutdown() {
        let p = parts();
        p.deletions
            .schedule(Location::new("9", 1), Duration::ZERO)
            .await
            .unwrap();

        let (mut processor, shutdown_tx) = BackgroundProcessorBuilder::new()
            .deletions(Arc::clone(&p.deletions))
            .metrics(Arc::clone(&p.metrics))
            .build()
            .unwrap();
        let handle = tokio::spawn(async move { processor.run().await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(p.gateway.delete_calls(), 1);

        shutdown_tx.send(()).await.unwrap();
        handle.await.unwrap();
        assert_eq!(p.metrics.snapshot().deletions_executed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_tokens_when_enabled() {
        let p = parts();
        p.tokens.issue(&SubjectId::new("u1")).await.unwrap();
        p.clock.advance(chrono::Duration::hours(25));

        let (mut processor, shutdown_tx) = BackgroundProcessorBuilder::new()
            .config(BackgroundConfig {
                enable_deletions: false,
                enable_token_sweep: true,
                ..BackgroundConfig::default()
            })
            .tokens(Arc::clone(&p.tokens))
            .metrics(Arc::clone(&p.metrics))
            .build()
            .unwrap();
        let handle = tokio::spawn(async move { processor.run().await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).await.unwrap();
        handle.await.unwrap();

        assert_eq!(p.metrics.snapshot().tokens_swept, 1);
        assert!(p.tokens.current(&SubjectId::new("u1")).await.unwrap().is_none());
    }
}
