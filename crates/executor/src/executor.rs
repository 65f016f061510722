use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use vaultgate_core::{Location, SubjectId};
use vaultgate_provider::{DeliveryError, DynGateway, FailureClass};

use crate::config::ExecutorConfig;
use crate::throttle::Throttle;

/// Terminal outcome of one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered; carries the coordinate of the recipient's copy.
    Delivered(Location),
    /// The recipient can never be reached.
    Permanent(DeliveryError),
    /// Retries ran out. The recipient stays registered.
    Exhausted(DeliveryError),
    /// The platform itself is unusable (credentials, missing source).
    Fatal(DeliveryError),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// What happened while resolving one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub recipient: SubjectId,
    pub outcome: SendOutcome,
    /// Platform calls made, including the successful one.
    pub attempts: u32,
    pub rate_limit_hits: u32,
    pub transient_retries: u32,
}

/// States of the per-send machine. `Done` is terminal.
#[derive(Debug)]
enum SendState {
    Attempt,
    Backoff(Duration),
    Done(SendOutcome),
}

/// Resolves a single send to exactly one [`SendOutcome`].
///
/// Every attempt first passes the shared [`Throttle`]. A rate-limit signal
/// pauses the whole throttle (not just this send) and is retried up to
/// [`ExecutorConfig::max_rate_limit_retries`] times. Transient failures back
/// off per the [`RetryStrategy`](crate::RetryStrategy) and are retried up to
/// [`ExecutorConfig::max_transient_retries`] times. Nothing loops forever.
#[derive(Debug, Clone, Default)]
pub struct DeliveryExecutor {
    config: ExecutorConfig,
}

#[derive(Debug, Default)]
struct Counters {
    attempts: u32,
    rate_limit_hits: u32,
    transient_retries: u32,
}

impl DeliveryExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Copy `source` to `recipient`.
    #[instrument(skip(self, gateway, throttle), fields(%source, %recipient))]
    pub async fn deliver(
        &self,
        gateway: &dyn DynGateway,
        source: &Location,
        recipient: &SubjectId,
        throttle: &Throttle,
    ) -> SendReport {
        let mut counters = Counters::default();
        let mut state = SendState::Attempt;

        let outcome = loop {
            state = match state {
                SendState::Attempt => {
                    throttle.acquire().await;
                    counters.attempts += 1;
                    let result =
                        tokio::time::timeout(self.config.send_timeout, gateway.deliver(source, recipient))
                            .await;
                    match result {
                        Ok(Ok(copy)) => SendState::Done(SendOutcome::Delivered(copy)),
                        Ok(Err(err)) => self.on_failure(err, &mut counters, throttle),
                        Err(_elapsed) => self.on_failure(
                            DeliveryError::Timeout(self.config.send_timeout),
                            &mut counters,
                            throttle,
                        ),
                    }
                }
                SendState::Backoff(delay) => {
                    tokio::time::sleep(delay).await;
                    SendState::Attempt
                }
                SendState::Done(outcome) => break outcome,
            };
        };

        SendReport {
            recipient: recipient.clone(),
            outcome,
            attempts: counters.attempts,
            rate_limit_hits: counters.rate_limit_hits,
            transient_retries: counters.transient_retries,
        }
    }

    fn on_failure(
        &self,
        err: DeliveryError,
        counters: &mut Counters,
        throttle: &Throttle,
    ) -> SendState {
        match err.classify() {
            FailureClass::RateLimited(retry_after) => {
                counters.rate_limit_hits += 1;
                // Honour the signal even if this send gives up.
                throttle.pause_for(retry_after);
                if counters.rate_limit_hits > self.config.max_rate_limit_retries {
                    info!(
                        hits = counters.rate_limit_hits,
                        "rate-limit retries used up, leaving recipient for a later run"
                    );
                    return SendState::Done(SendOutcome::Exhausted(err));
                }
                debug!(
                    retry_after_ms = retry_after.as_millis(),
                    hits = counters.rate_limit_hits,
                    "rate limited, retrying after pause"
                );
                SendState::Attempt
            }
            FailureClass::Permanent => {
                info!(error = %err, "recipient permanently unreachable");
                SendState::Done(SendOutcome::Permanent(err))
            }
            FailureClass::Fatal => SendState::Done(SendOutcome::Fatal(err)),
            FailureClass::Transient => {
                if counters.transient_retries >= self.config.max_transient_retries {
                    warn!(
                        error = %err,
                        attempts = counters.attempts,
                        "transient failures exhausted retries"
                    );
                    return SendState::Done(SendOutcome::Exhausted(err));
                }
                let delay = self.config.retry_strategy.delay_for(counters.transient_retries);
                counters.transient_retries += 1;
                debug!(
                    error = %err,
                    retry = counters.transient_retries,
                    delay_ms = delay.as_millis(),
                    "transient failure, will retry"
                );
                SendState::Backoff(delay)
            }
        }
    }
}
