use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters tracking engine activity.
///
/// All counters use relaxed ordering. For a consistent point-in-time view,
/// call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    /// Access tokens minted.
    pub tokens_issued: AtomicU64,
    /// Expired tokens removed by the sweeper.
    pub tokens_swept: AtomicU64,
    /// Access requests that passed authorization.
    pub access_granted: AtomicU64,
    /// Access requests rejected for a missing or stale token.
    pub access_denied: AtomicU64,
    /// Request-path copies delivered to a subject.
    pub deliveries: AtomicU64,
    /// Request-path deliveries that failed.
    pub delivery_failures: AtomicU64,
    /// Content references registered.
    pub content_registered: AtomicU64,
    pub broadcasts_started: AtomicU64,
    pub broadcasts_completed: AtomicU64,
    /// Broadcasts stopped early by cancellation or a fatal error.
    pub broadcasts_aborted: AtomicU64,
    /// Broadcast sends that reached their recipient.
    pub broadcast_delivered: AtomicU64,
    /// Recipients removed after a permanent broadcast failure.
    pub recipients_pruned: AtomicU64,
    /// Broadcast sends that used up their retries.
    pub broadcast_exhausted: AtomicU64,
    pub deletions_scheduled: AtomicU64,
    /// Deletions the platform confirmed.
    pub deletions_executed: AtomicU64,
    /// Deletions the platform rejected. The obligation is still resolved.
    pub deletions_failed: AtomicU64,
}

impl GatewayMetrics {
    pub fn increment_tokens_issued(&self) {
        self.tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_tokens_swept(&self, n: u64) {
        self.tokens_swept.fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment_access_granted(&self) {
        self.access_granted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_access_denied(&self) {
        self.access_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deliveries(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_delivery_failures(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_content_registered(&self) {
        self.content_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_broadcasts_started(&self) {
        self.broadcasts_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_broadcasts_completed(&self) {
        self.broadcasts_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_broadcasts_aborted(&self) {
        self.broadcasts_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_broadcast_delivered(&self, n: u64) {
        self.broadcast_delivered.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_recipients_pruned(&self, n: u64) {
        self.recipients_pruned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_broadcast_exhausted(&self, n: u64) {
        self.broadcast_exhausted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment_deletions_scheduled(&self) {
        self.deletions_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deletions_executed(&self) {
        self.deletions_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deletions_failed(&self) {
        self.deletions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tokens_issued: self.tokens_issued.load(Ordering::Relaxed),
            tokens_swept: self.tokens_swept.load(Ordering::Relaxed),
            access_granted: self.access_granted.load(Ordering::Relaxed),
            access_denied: self.access_denied.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            content_registered: self.content_registered.load(Ordering::Relaxed),
            broadcasts_started: self.broadcasts_started.load(Ordering::Relaxed),
            broadcasts_completed: self.broadcasts_completed.load(Ordering::Relaxed),
            broadcasts_aborted: self.broadcasts_aborted.load(Ordering::Relaxed),
            broadcast_delivered: self.broadcast_delivered.load(Ordering::Relaxed),
            recipients_pruned: self.recipients_pruned.load(Ordering::Relaxed),
            broadcast_exhausted: self.broadcast_exhausted.load(Ordering::Relaxed),
            deletions_scheduled: self.deletions_scheduled.load(Ordering::Relaxed),
            deletions_executed: self.deletions_executed.load(Ordering::Relaxed),
            deletions_failed: self.deletions_failed.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`GatewayMetrics`] at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub tokens_issued: u64,
    pub tokens_swept: u64,
    pub access_granted: u64,
    pub access_denied: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub content_registered: u64,
    pub broadcasts_started: u64,
    pub broadcasts_completed: u64,
    pub broadcasts_aborted: u64,
    pub broadcast_delivered: u64,
    pub recipients_pruned: u64,
    pub broadcast_exhausted: u64,
    pub deletions_scheduled: u64,
    pub deletions_executed: u64,
    pub deletions_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = GatewayMetrics::default();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn increments_show_in_snapshot() {
        let m = GatewayMetrics::default();
        m.increment_tokens_issued();
        m.increment_tokens_issued();
        m.increment_access_denied();
        m.add_broadcast_delivered(5);
        m.add_recipients_pruned(2);
        m.increment_deletions_failed();

        let snap = m.snapshot();
        assert_eq!(snap.tokens_issued, 2);
        assert_eq!(snap.access_denied, 1);
        assert_eq!(snap.access_granted, 0);
        assert_eq!(snap.broadcast_delivered, 5);
        assert_eq!(snap.recipients_pruned, 2);
        assert_eq!(snap.deletions_failed, 1);
    }

    #[test]
    fn concurrent_increments() {
        use std::sync::Arc;
        let m = Arc::new(GatewayMetrics::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        m.increment_deliveries();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.snapshot().deliveries, 800);
    }
}
