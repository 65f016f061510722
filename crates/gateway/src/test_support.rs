//! In-crate gateway double shared by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tokio::time::Instant;

use vaultgate_core::{Location, ManualClock, SubjectId};
use vaultgate_provider::{DeliveryError, Gateway};
use vaultgate_state::StateStore;
use vaultgate_state_memory::MemoryStateStore;

#[derive(Debug, Default)]
pub(crate) struct TestGateway {
    next_id: AtomicI64,
    queued: Mutex<HashMap<SubjectId, VecDeque<DeliveryError>>>,
    always: Mutex<HashMap<SubjectId, DeliveryError>>,
    pub(crate) delivered: Mutex<Vec<(SubjectId, Location, Instant)>>,
    pub(crate) sources: Mutex<Vec<Location>>,
    pub(crate) deleted: Mutex<Vec<Location>>,
    pub(crate) relocated: Mutex<Vec<(Location, String)>>,
    delete_error: Mutex<Option<DeliveryError>>,
    delete_delay: Mutex<Option<Duration>>,
    health_error: Mutex<Option<DeliveryError>>,
    hang: Mutex<HashSet<SubjectId>>,
}

impl TestGateway {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next sends to `subject` with `errors`, in order, then succeed.
    pub(crate) fn queue(&self, subject: &str, errors: impl IntoIterator<Item = DeliveryError>) {
        self.queued
            .lock()
            .entry(SubjectId::new(subject))
            .or_default()
            .extend(errors);
    }

    pub(crate) fn always_fail(&self, subject: &str, error: DeliveryError) {
        self.always.lock().insert(SubjectId::new(subject), error);
    }

    pub(crate) fn hang_for(&self, subject: &str) {
        self.hang.lock().insert(SubjectId::new(subject));
    }

    pub(crate) fn fail_deletes(&self, error: DeliveryError) {
        *self.delete_error.lock() = Some(error);
    }

    /// Hold every delete call for `delay` after recording it.
    pub(crate) fn slow_deletes(&self, delay: Duration) {
        *self.delete_delay.lock() = Some(delay);
    }

    pub(crate) fn fail_health(&self, error: DeliveryError) {
        *self.health_error.lock() = Some(error);
    }

    pub(crate) fn delivered_to(&self) -> Vec<SubjectId> {
        self.delivered.lock().iter().map(|(s, _, _)| s.clone()).collect()
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.deleted.lock().len()
    }
}

impl Gateway for TestGateway {
    fn name(&self) -> &str {
        "test"
    }

    async fn deliver(&self, source: &Location, recipient: &SubjectId) -> Result<Location, DeliveryError> {
        if self.hang.lock().contains(recipient) {
            std::future::pending::<()>().await;
        }
        let permanent = self.always.lock().get(recipient).cloned();
        if let Some(err) = permanent {
            return Err(err);
        }
        let queued = self
            .queued
            .lock()
            .get_mut(recipient)
            .and_then(VecDeque::pop_front);
        if let Some(err) = queued {
            return Err(err);
        }
        let copy = Location::new(recipient.as_str(), self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.delivered
            .lock()
            .push((recipient.clone(), copy.clone(), Instant::now()));
        self.sources.lock().push(source.clone());
        Ok(copy)
    }

    async fn delete(&self, location: &Location) -> Result<(), DeliveryError> {
        self.deleted.lock().push(location.clone());
        let delay = *self.delete_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.delete_error.lock().clone();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn relocate(&self, source: &Location, destination_chat: &str) -> Result<Location, DeliveryError> {
        self.relocated
            .lock()
            .push((source.clone(), destination_chat.to_owned()));
        Ok(Location::new(
            destination_chat,
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
        ))
    }

    async fn health_check(&self) -> Result<(), DeliveryError> {
        let failure = self.health_error.lock().clone();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub(crate) fn memory_store() -> Arc<dyn StateStore> {
    Arc::new(MemoryStateStore::new())
}

pub(crate) fn manual_clock() -> Arc<ManualClock> {
    let start = Utc
        .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .expect("valid start time");
    Arc::new(ManualClock::new(start))
}
