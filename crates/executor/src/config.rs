use std::time::Duration;

use crate::retry::RetryStrategy;

/// Bounds of the per-send state machine.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Retries after a transient failure (network, timeout).
    pub max_transient_retries: u32,
    /// Retries after a rate-limit signal. Past this the send is exhausted.
    pub max_rate_limit_retries: u32,
    /// Backoff between transient retries.
    pub retry_strategy: RetryStrategy,
    /// Upper bound on a single platform call.
    pub send_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_transient_retries: 2,
            max_rate_limit_retries: 3,
            retry_strategy: RetryStrategy::default(),
            send_timeout: Duration::from_secs(30),
        }
    }
}
