//! Dispatcher-wide pacing shared by every send of a run.
//!
//! Two independent gates sit in front of each attempt: a pause imposed by
//! rate-limit signals, and an optional sliding window capping how many
//! attempts start within any span of `per`.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// At most `max_sends` attempts may start within any window of `per`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputWindow {
    pub max_sends: u32,
    pub per: Duration,
}

impl ThroughputWindow {
    #[must_use]
    pub fn new(max_sends: u32, per: Duration) -> Self {
        Self {
            max_sends: max_sends.max(1),
            per,
        }
    }
}

#[derive(Debug, Default)]
struct ThrottleState {
    paused_until: Option<Instant>,
    recent: VecDeque<Instant>,
    total_paused: Duration,
    pauses: u64,
}

#[derive(Debug, Default)]
pub struct Throttle {
    window: Option<ThroughputWindow>,
    state: Mutex<ThrottleState>,
}

impl Throttle {
    #[must_use]
    pub fn new(window: Option<ThroughputWindow>) -> Self {
        Self {
            window: window.map(|w| ThroughputWindow::new(w.max_sends, w.per)),
            state: Mutex::new(ThrottleState::default()),
        }
    }

    /// A throttle with no window; only rate-limit pauses apply.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn window(&self) -> Option<ThroughputWindow> {
        self.window
    }

    /// Suspend every sender for `by`.
    ///
    /// Pauses compound additively: a signal arriving while already paused
    /// extends the current pause instead of restarting it.
    pub fn pause_for(&self, by: Duration) {
        let now = Instant::now();
        let mut state = self.state.lock();
        let from = state.paused_until.filter(|until| *until > now).unwrap_or(now);
        let until = from + by;
        state.paused_until = Some(until);
        state.total_paused += by;
        state.pauses += 1;
        debug!(
            pause_ms = by.as_millis(),
            remaining_ms = (until - now).as_millis(),
            "dispatcher paused"
        );
    }

    /// End of the current pause, if one is in effect.
    pub fn paused_until(&self) -> Option<Instant> {
        let now = Instant::now();
        self.state.lock().paused_until.filter(|until| *until > now)
    }

    /// Sum of every pause requested so far.
    pub fn total_paused(&self) -> Duration {
        self.state.lock().total_paused
    }

    /// Number of pause requests so far.
    pub fn pause_count(&self) -> u64 {
        self.state.lock().pauses
    }

    /// Wait until an attempt may start, then record it against the window.
    pub async fn acquire(&self) {
        loop {
            let wait_until = self.try_acquire(Instant::now());
            match wait_until {
                None => return,
                Some(deadline) => tokio::time::sleep_until(deadline).await,
            }
        }
    }

    /// Either claim a slot (`None`) or report when to check again.
    fn try_acquire(&self, now: Instant) -> Option<Instant> {
        let mut state = self.state.lock();

        if let Some(until) = state.paused_until.filter(|until| *until > now) {
            return Some(until);
        }

        let Some(window) = self.window else {
            return None;
        };

        while state
            .recent
            .front()
            .is_some_and(|started| *started + window.per <= now)
        {
            state.recent.pop_front();
        }

        if state.recent.len() < window.max_sends as usize {
            state.recent.push_back(now);
            None
        } else {
            state.recent.front().map(|oldest| *oldest + window.per)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pauses_compound_additively() {
        let throttle = Throttle::unlimited();
        let start = Instant::now();

        throttle.pause_for(Duration::from_secs(5));
        throttle.pause_for(Duration::from_secs(3));

        assert_eq!(
            throttle.paused_until(),
            Some(start + Duration::from_secs(8))
        );
        assert_eq!(throttle.total_paused(), Duration::from_secs(8));
        assert_eq!(throttle.pause_count(), 2);

        throttle.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(8));
        assert!(throttle.paused_until().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_pause_restarts_from_now() {
        let throttle = Throttle::unlimited();
        throttle.pause_for(Duration::from_secs(2));
        tokio::time::advance(Duration::from_secs(10)).await;

        let now = Instant::now();
        throttle.pause_for(Duration::from_secs(1));
        assert_eq!(throttle.paused_until(), Some(now + Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn window_caps_attempts_per_span() {
        let throttle = Throttle::new(Some(ThroughputWindow::new(2, Duration::from_secs(1))));
        let start = Instant::now();

        let mut offsets = Vec::new();
        for _ in 0..5 {
            throttle.acquire().await;
            offsets.push(start.elapsed());
        }

        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(2),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquirers_share_the_window() {
        let throttle = Arc::new(Throttle::new(Some(ThroughputWindow::new(
            3,
            Duration::from_secs(1),
        ))));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..9 {
            let throttle = Arc::clone(&throttle);
            handles.push(tokio::spawn(async move {
                throttle.acquire().await;
                start.elapsed()
            }));
        }

        let mut offsets = Vec::new();
        for h in handles {
            offsets.push(h.await.unwrap());
        }
        offsets.sort();

        for i in 3..offsets.len() {
            assert!(
                offsets[i] - offsets[i - 3] >= Duration::from_secs(1),
                "more than 3 attempts inside one second: {offsets:?}"
            );
        }
    }

    #[test]
    fn zero_sized_window_is_clamped() {
        let throttle = Throttle::new(Some(ThroughputWindow {
            max_sends: 0,
            per: Duration::from_secs(1),
        }));
        assert_eq!(throttle.window().map(|w| w.max_sends), Some(1));
    }
}
