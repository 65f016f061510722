use std::time::Duration;

/// Backoff curve applied between transient-failure retries of one send.
///
/// Rate-limit pauses do not use this; they follow the platform's
/// `retry_after` exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// `base * multiplier^attempt`, clamped to `max`.
    Exponential {
        base: Duration,
        max: Duration,
        multiplier: f64,
    },
    /// `delay * (attempt + 1)`, clamped to `max`.
    Linear { delay: Duration, max: Duration },
    /// The same delay before every retry.
    Constant { delay: Duration },
}

impl RetryStrategy {
    /// Delay before retry number `attempt` (zero-based).
    ///
    /// ```
    /// use std::time::Duration;
    /// use vaultgate_executor::RetryStrategy;
    ///
    /// let strategy = RetryStrategy::Constant { delay: Duration::from_secs(1) };
    /// assert_eq!(strategy.delay_for(3), Duration::from_secs(1));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Exponential {
                base,
                max,
                multiplier,
            } => {
                // Retry counts are tiny, the cast cannot wrap.
                #[allow(clippy::cast_possible_wrap)]
                let raw = base.as_secs_f64() * multiplier.powi(attempt as i32);
                Duration::from_secs_f64(raw.min(max.as_secs_f64()))
            }
            Self::Linear { delay, max } => {
                let raw = delay.as_secs_f64() * f64::from(attempt.saturating_add(1));
                Duration::from_secs_f64(raw.min(max.as_secs_f64()))
            }
            Self::Constant { delay } => *delay,
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}
