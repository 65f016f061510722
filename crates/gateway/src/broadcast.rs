//! Rate-limited, fault-tolerant fan-out of one message to many recipients.
//!
//! Recipients are split into fixed-size waves. Every send of a wave runs
//! concurrently and the wave fully resolves before the next one starts, so
//! at most one wave of sends is ever in flight. All sends of a run share a
//! single [`Throttle`]: a rate-limit signal from any send pauses the whole
//! run, and the optional throughput window caps attempts across waves.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use vaultgate_core::{Location, SubjectId};
use vaultgate_executor::{DeliveryExecutor, SendOutcome, SendReport, Throttle, ThroughputWindow};
use vaultgate_provider::{DeliveryError, DynGateway};

use crate::error::BroadcastError;
use crate::metrics::GatewayMetrics;
use crate::recipients::RecipientRegistry;

/// Tunables of a single broadcast run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastOptions {
    /// Sends dispatched concurrently per wave.
    pub wave_size: usize,
    /// Pause between consecutive waves.
    pub wave_interval: Duration,
    /// Ceiling on send attempts per sliding window, retries included.
    pub window: Option<ThroughputWindow>,
    /// Remove permanently unreachable recipients from the registry.
    pub prune_permanent: bool,
    /// Refresh `last_active_at` of recipients that received the message.
    pub update_last_active: bool,
}

impl Default for BroadcastOptions {
    fn default() -> Self {
        Self {
            wave_size: 25,
            wave_interval: Duration::from_secs(1),
            window: Some(ThroughputWindow::new(25, Duration::from_secs(1))),
            prune_permanent: true,
            update_last_active: true,
        }
    }
}

/// Live counters of a run, published after every wave.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastProgress {
    pub total: usize,
    pub waves_completed: usize,
    pub waves_total: usize,
    pub succeeded: usize,
    pub permanent_failures: usize,
    pub exhausted: usize,
    pub transient_retries: u64,
    pub rate_limit_hits: u64,
    pub finished: bool,
}

impl BroadcastProgress {
    /// Recipients with a terminal outcome so far.
    pub fn resolved(&self) -> usize {
        self.succeeded + self.permanent_failures + self.exhausted
    }
}

/// Final tallies of a run.
///
/// `succeeded + permanent_failures + exhausted + aborted + not_attempted`
/// always equals `total`. For a run that finished normally the last two
/// are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastSummary {
    pub total: usize,
    pub succeeded: usize,
    pub permanent_failures: usize,
    pub exhausted: usize,
    /// Sends that hit a fatal platform condition.
    pub aborted: usize,
    /// Recipients never attempted because the run stopped early.
    pub not_attempted: usize,
    pub transient_retries: u64,
    pub rate_limit_hits: u64,
    /// Recipients actually removed from the registry.
    pub pruned: usize,
    pub waves_completed: usize,
    pub waves_total: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl BroadcastSummary {
    /// Whether every recipient reached a terminal outcome.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.aborted == 0 && self.not_attempted == 0
    }

    fn progress(&self, finished: bool) -> BroadcastProgress {
        BroadcastProgress {
            total: self.total,
            waves_completed: self.waves_completed,
            waves_total: self.waves_total,
            succeeded: self.succeeded,
            permanent_failures: self.permanent_failures,
            exhausted: self.exhausted,
            transient_retries: self.transient_retries,
            rate_limit_hits: self.rate_limit_hits,
            finished,
        }
    }
}

/// Fans content out through a [`DynGateway`] in waves.
pub struct BroadcastDispatcher {
    gateway: Arc<dyn DynGateway>,
    recipients: Arc<RecipientRegistry>,
    executor: DeliveryExecutor,
    metrics: Arc<GatewayMetrics>,
}

impl BroadcastDispatcher {
    pub fn new(
        gateway: Arc<dyn DynGateway>,
        recipients: Arc<RecipientRegistry>,
        executor: DeliveryExecutor,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            gateway,
            recipients,
            executor,
            metrics,
        }
    }

    /// Run a broadcast to completion without progress reporting or
    /// cancellation.
    pub async fn broadcast(
        &self,
        source: &Location,
        recipients: Vec<SubjectId>,
        options: &BroadcastOptions,
    ) -> Result<BroadcastSummary, BroadcastError> {
        let (progress, _) = watch::channel(BroadcastProgress::default());
        self.run(source, recipients, options, &progress, &CancellationToken::new())
            .await
    }

    /// Start a broadcast on its own task.
    pub fn spawn(
        self: &Arc<Self>,
        source: Location,
        recipients: Vec<SubjectId>,
        options: BroadcastOptions,
    ) -> BroadcastHandle {
        let (progress_tx, progress_rx) = watch::channel(BroadcastProgress::default());
        let cancel = CancellationToken::new();
        let dispatcher = Arc::clone(self);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            dispatcher
                .run(&source, recipients, &options, &progress_tx, &token)
                .await
        });
        BroadcastHandle {
            progress: progress_rx,
            cancel,
            task,
        }
    }

    /// Run a broadcast, publishing progress after every wave and checking
    /// `cancel` between waves. A wave in flight always completes.
    #[instrument(skip_all, fields(%source, recipients = recipients.len()))]
    pub async fn run(
        &self,
        source: &Location,
        recipients: Vec<SubjectId>,
        options: &BroadcastOptions,
        progress: &watch::Sender<BroadcastProgress>,
        cancel: &CancellationToken,
    ) -> Result<BroadcastSummary, BroadcastError> {
        let started = Instant::now();
        let recipients = dedupe(recipients);
        let wave_size = options.wave_size.max(1);
        let mut summary = BroadcastSummary {
            total: recipients.len(),
            waves_total: recipients.len().div_ceil(wave_size),
            ..BroadcastSummary::default()
        };
        self.metrics.increment_broadcasts_started();
        progress.send_replace(summary.progress(false));

        if let Err(err) = self.gateway.health_check().await {
            error!(error = %err, gateway = self.gateway.name(), "platform unreachable, broadcast not started");
            self.metrics.increment_broadcasts_aborted();
            summary.not_attempted = summary.total;
            progress.send_replace(summary.progress(true));
            return Err(BroadcastError::Unreachable(err));
        }

        info!(
            total = summary.total,
            waves = summary.waves_total,
            wave_size,
            "broadcast started"
        );

        let throttle = Throttle::new(options.window);
        let mut attempted = 0;
        let mut fatal = None;

        for (index, wave) in recipients.chunks(wave_size).enumerate() {
            if index > 0 && !options.wave_interval.is_zero() {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(options.wave_interval) => {}
                }
            }
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let reports = join_all(wave.iter().map(|recipient| {
                self.executor
                    .deliver(self.gateway.as_ref(), source, recipient, &throttle)
            }))
            .await;
            attempted += wave.len();
            fatal = self.settle(reports, options, &mut summary).await;
            summary.waves_completed += 1;
            progress.send_replace(summary.progress(false));
            debug!(
                wave = index + 1,
                of = summary.waves_total,
                succeeded = summary.succeeded,
                "wave finished"
            );

            if fatal.is_some() {
                break;
            }
        }

        summary.not_attempted = summary.total - attempted;
        summary.elapsed = started.elapsed();
        progress.send_replace(summary.progress(true));

        if let Some(err) = fatal {
            error!(
                error = %err,
                not_attempted = summary.not_attempted,
                "broadcast aborted on a fatal delivery error"
            );
            self.metrics.increment_broadcasts_aborted();
            return Err(BroadcastError::Fatal {
                error: err,
                summary: Box::new(summary),
            });
        }

        if summary.cancelled {
            info!(
                not_attempted = summary.not_attempted,
                waves_completed = summary.waves_completed,
                "broadcast cancelled"
            );
            self.metrics.increment_broadcasts_aborted();
        } else {
            info!(
                succeeded = summary.succeeded,
                permanent_failures = summary.permanent_failures,
                exhausted = summary.exhausted,
                elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
                "broadcast finished"
            );
            self.metrics.increment_broadcasts_completed();
        }
        Ok(summary)
    }

    /// Fold a wave's reports into the summary and apply registry side
    /// effects. Returns the first fatal error seen, if any.
    async fn settle(
        &self,
        reports: Vec<SendReport>,
        options: &BroadcastOptions,
        summary: &mut BroadcastSummary,
    ) -> Option<DeliveryError> {
        let mut fatal = None;
        let mut delivered = Vec::new();
        let mut unreachable = Vec::new();
        let mut exhausted = 0u64;

        for report in reports {
            summary.transient_retries += u64::from(report.transient_retries);
            summary.rate_limit_hits += u64::from(report.rate_limit_hits);
            match report.outcome {
                SendOutcome::Delivered(_) => {
                    summary.succeeded += 1;
                    delivered.push(report.recipient);
                }
                SendOutcome::Permanent(_) => {
                    summary.permanent_failures += 1;
                    unreachable.push(report.recipient);
                }
                SendOutcome::Exhausted(_) => {
                    summary.exhausted += 1;
                    exhausted += 1;
                }
                SendOutcome::Fatal(err) => {
                    summary.aborted += 1;
                    fatal.get_or_insert(err);
                }
            }
        }

        self.metrics.add_broadcast_delivered(delivered.len() as u64);
        self.metrics.add_broadcast_exhausted(exhausted);

        if options.prune_permanent && !unreachable.is_empty() {
            let removals = join_all(unreachable.iter().map(|s| self.recipients.remove(s))).await;
            for (subject, removal) in unreachable.iter().zip(removals) {
                match removal {
                    Ok(true) => {
                        summary.pruned += 1;
                        self.metrics.add_recipients_pruned(1);
                        debug!(%subject, "recipient pruned");
                    }
                    Ok(false) => {}
                    Err(e) => warn!(%subject, error = %e, "failed to prune recipient"),
                }
            }
        }

        if options.update_last_active && !delivered.is_empty() {
            let touches = join_all(delivered.iter().map(|s| self.recipients.touch(s))).await;
            for (subject, touch) in delivered.iter().zip(touches) {
                if let Err(e) = touch {
                    debug!(%subject, error = %e, "failed to record activity");
                }
            }
        }

        fatal
    }
}

/// A broadcast running on its own task.
#[derive(Debug)]
pub struct BroadcastHandle {
    progress: watch::Receiver<BroadcastProgress>,
    cancel: CancellationToken,
    task: JoinHandle<Result<BroadcastSummary, BroadcastError>>,
}

impl BroadcastHandle {
    /// A receiver that observes every published progress update.
    pub fn progress(&self) -> watch::Receiver<BroadcastProgress> {
        self.progress.clone()
    }

    pub fn latest(&self) -> BroadcastProgress {
        self.progress.borrow().clone()
    }

    /// Stop the run before its next wave.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to end.
    pub async fn join(self) -> Result<BroadcastSummary, BroadcastError> {
        self.task
            .await
            .map_err(|e| BroadcastError::Task(e.to_string()))?
    }
}

/// Drop repeated subjects, keeping first occurrences in order.
fn dedupe(recipients: Vec<SubjectId>) -> Vec<SubjectId> {
    let mut seen = HashSet::with_capacity(recipients.len());
    recipients
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
