//! Assertion helpers for access results and broadcast summaries.

use std::time::Duration;

use vaultgate_gateway::{BroadcastSummary, Delivery, GatewayError};

use crate::provider::CapturedCall;

/// Assertion helpers over recorded gateway traffic.
pub struct SideEffectAssertions;

impl SideEffectAssertions {
    /// Assert that no `max` calls fall within any `per`-long window.
    ///
    /// # Panics
    ///
    /// Panics if `max + 1` calls land inside one window.
    pub fn assert_throughput_within(calls: &[CapturedCall], max: usize, per: Duration) {
        let mut times: Vec<_> = calls.iter().map(|c| c.at).collect();
        times.sort_unstable();
        for (i, pair) in times.windows(max + 1).enumerate() {
            let span = pair[max].duration_since(pair[0]);
            assert!(
                span >= per,
                "calls {i}..={} span {span:?}, more than {max} per {per:?}",
                i + max
            );
        }
    }

    /// Assert every result in `results` is a successful delivery.
    ///
    /// # Panics
    ///
    /// Panics on the first failure.
    pub fn assert_all_delivered(results: &[Result<Delivery, GatewayError>]) {
        for (i, result) in results.iter().enumerate() {
            assert!(result.is_ok(), "result {i}: expected delivery, got {result:?}");
        }
    }
}

/// Extension methods for checking the outcome of an access request.
pub trait AccessResultExt {
    fn assert_delivered(&self) -> &Delivery;
    fn assert_unauthorized(&self);
    fn assert_not_found(&self);
    fn assert_banned(&self);
}

impl AccessResultExt for Result<Delivery, GatewayError> {
    fn assert_delivered(&self) -> &Delivery {
        match self {
            Ok(delivery) => delivery,
            Err(e) => panic!("expected delivery, got error: {e}"),
        }
    }

    fn assert_unauthorized(&self) {
        assert!(
            matches!(self, Err(GatewayError::Unauthorized { .. })),
            "expected Unauthorized, got {self:?}"
        );
    }

    fn assert_not_found(&self) {
        assert!(
            matches!(
                self,
                Err(GatewayError::ContentNotFound(_) | GatewayError::BatchNotFound(_))
            ),
            "expected not found, got {self:?}"
        );
    }

    fn assert_banned(&self) {
        assert!(
            matches!(self, Err(GatewayError::Banned { .. })),
            "expected Banned, got {self:?}"
        );
    }
}

/// Extension methods for checking a broadcast summary.
pub trait BroadcastSummaryExt {
    /// Every recipient reached exactly one terminal outcome.
    fn assert_complete(&self);
    fn assert_counts(&self, succeeded: usize, permanent_failures: usize, exhausted: usize);
}

impl BroadcastSummaryExt for BroadcastSummary {
    fn assert_complete(&self) {
        assert!(self.is_complete(), "broadcast did not complete: {self:?}");
        assert_eq!(
            self.succeeded + self.permanent_failures + self.exhausted,
            self.total,
            "outcomes do not account for every recipient: {self:?}"
        );
    }

    fn assert_counts(&self, succeeded: usize, permanent_failures: usize, exhausted: usize) {
        assert_eq!(
            (self.succeeded, self.permanent_failures, self.exhausted),
            (succeeded, permanent_failures, exhausted),
            "unexpected (succeeded, permanent, exhausted) in {self:?}"
        );
    }
}
