use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use vaultgate_core::{Location, SubjectId};
use vaultgate_provider::{DeliveryError, Gateway};

/// Which gateway operation a captured call was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Deliver,
    Delete,
    Relocate,
    HealthCheck,
}

/// One call observed by a [`RecordingGateway`].
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub kind: CallKind,
    /// Source of a delivery or relocation, or the deleted location.
    pub location: Option<Location>,
    pub recipient: Option<SubjectId>,
    pub destination: Option<String>,
    /// When the call arrived, on the tokio clock.
    pub at: Instant,
    /// The error returned, if the call failed.
    pub error: Option<DeliveryError>,
}

impl CapturedCall {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Gateway-wide failure injection for deliveries.
#[derive(Debug, Clone, Default)]
pub enum FailureMode {
    #[default]
    None,
    /// Every delivery fails.
    Always(DeliveryError),
    /// Every n-th delivery (1-based) fails.
    EveryN(usize, DeliveryError),
    /// The first n deliveries fail.
    FirstN(usize, DeliveryError),
}

impl FailureMode {
    fn check(&self, call_number: usize) -> Option<DeliveryError> {
        match self {
            Self::None => None,
            Self::Always(err) => Some(err.clone()),
            Self::EveryN(n, err) if *n > 0 && call_number % n == 0 => Some(err.clone()),
            Self::FirstN(n, err) if call_number <= *n => Some(err.clone()),
            Self::EveryN(..) | Self::FirstN(..) => None,
        }
    }
}

/// A gateway that records every call and hands out fresh message ids.
///
/// Failures can be injected globally with a [`FailureMode`] or per recipient:
/// a recipient can fail permanently or follow a script of errors before
/// succeeding.
#[derive(Debug)]
pub struct RecordingGateway {
    name: String,
    next_message_id: AtomicI64,
    deliveries: AtomicUsize,
    calls: Mutex<Vec<CapturedCall>>,
    failure_mode: Mutex<FailureMode>,
    always: Mutex<HashMap<SubjectId, DeliveryError>>,
    scripts: Mutex<HashMap<SubjectId, VecDeque<DeliveryError>>>,
    delete_failure: Mutex<Option<DeliveryError>>,
    health_failure: Mutex<Option<DeliveryError>>,
    response_delay: Option<Duration>,
}

impl RecordingGateway {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_message_id: AtomicI64::new(1000),
            deliveries: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            failure_mode: Mutex::new(FailureMode::None),
            always: Mutex::new(HashMap::new()),
            scripts: Mutex::new(HashMap::new()),
            delete_failure: Mutex::new(None),
            health_failure: Mutex::new(None),
            response_delay: None,
        }
    }

    #[must_use]
    pub fn with_failure_mode(self, mode: FailureMode) -> Self {
        *self.failure_mode.lock() = mode;
        self
    }

    /// Delay every delivery by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.response_delay = Some(delay);
        self
    }

    pub fn set_failure_mode(&self, mode: FailureMode) {
        *self.failure_mode.lock() = mode;
    }

    /// Make every delivery to `subject` fail with `error`.
    pub fn fail_recipient(&self, subject: impl Into<SubjectId>, error: DeliveryError) {
        self.always.lock().insert(subject.into(), error);
    }

    /// Fail the next deliveries to `subject` with `errors` in order, then
    /// succeed.
    pub fn script_recipient(
        &self,
        subject: impl Into<SubjectId>,
        errors: impl IntoIterator<Item = DeliveryError>,
    ) {
        self.scripts
            .lock()
            .entry(subject.into())
            .or_default()
            .extend(errors);
    }

    pub fn fail_deletes(&self, error: DeliveryError) {
        *self.delete_failure.lock() = Some(error);
    }

    pub fn fail_health_check(&self, error: DeliveryError) {
        *self.health_failure.lock() = Some(error);
    }

    pub fn calls(&self) -> Vec<CapturedCall> {
        self.calls.lock().clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<CapturedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    /// Delivery attempts, successful or not.
    pub fn delivery_attempts(&self) -> Vec<CapturedCall> {
        self.calls_of(CallKind::Deliver)
    }

    /// Recipients that received a copy, in arrival order.
    pub fn delivered_to(&self) -> Vec<SubjectId> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.kind == CallKind::Deliver && c.succeeded())
            .filter_map(|c| c.recipient.clone())
            .collect()
    }

    /// Locations passed to `delete`.
    pub fn deleted(&self) -> Vec<Location> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.kind == CallKind::Delete)
            .filter_map(|c| c.location.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Assert the number of delivery attempts.
    ///
    /// # Panics
    ///
    /// Panics if the count differs.
    pub fn assert_deliveries(&self, expected: usize) {
        let actual = self.delivery_attempts().len();
        assert_eq!(
            actual, expected,
            "gateway '{}': expected {expected} delivery attempts, got {actual}",
            self.name
        );
    }

    /// # Panics
    ///
    /// Panics if `subject` never received a copy.
    pub fn assert_delivered_to(&self, subject: &str) {
        assert!(
            self.delivered_to().iter().any(|s| s.as_str() == subject),
            "gateway '{}': nothing was delivered to {subject}",
            self.name
        );
    }

    /// # Panics
    ///
    /// Panics if any call was made.
    pub fn assert_not_called(&self) {
        let count = self.call_count();
        assert_eq!(count, 0, "gateway '{}': expected no calls, got {count}", self.name);
    }

    fn record(
        &self,
        kind: CallKind,
        location: Option<&Location>,
        recipient: Option<&SubjectId>,
        destination: Option<&str>,
        error: Option<&DeliveryError>,
    ) {
        self.calls.lock().push(CapturedCall {
            kind,
            location: location.cloned(),
            recipient: recipient.cloned(),
            destination: destination.map(str::to_owned),
            at: Instant::now(),
            error: error.cloned(),
        });
    }

    fn fresh_message_id(&self) -> i64 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    fn delivery_failure(&self, recipient: &SubjectId) -> Option<DeliveryError> {
        let call_number = self.deliveries.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(err) = self.failure_mode.lock().check(call_number) {
            return Some(err);
        }
        if let Some(err) = self.always.lock().get(recipient).cloned() {
            return Some(err);
        }
        self.scripts
            .lock()
            .get_mut(recipient)
            .and_then(VecDeque::pop_front)
    }
}

impl Gateway for RecordingGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(
        &self,
        source: &Location,
        recipient: &SubjectId,
    ) -> Result<Location, DeliveryError> {
        if let Some(delay) = self.response_delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.delivery_failure(recipient);
        self.record(
            CallKind::Deliver,
            Some(source),
            Some(recipient),
            None,
            failure.as_ref(),
        );
        match failure {
            Some(err) => Err(err),
            None => Ok(Location::new(recipient.as_str(), self.fresh_message_id())),
        }
    }

    async fn delete(&self, location: &Location) -> Result<(), DeliveryError> {
        let failure = self.delete_failure.lock().clone();
        self.record(CallKind::Delete, Some(location), None, None, failure.as_ref());
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn relocate(
        &self,
        source: &Location,
        destination_chat: &str,
    ) -> Result<Location, DeliveryError> {
        self.record(
            CallKind::Relocate,
            Some(source),
            None,
            Some(destination_chat),
            None,
        );
        Ok(Location::new(destination_chat, self.fresh_message_id()))
    }

    async fn health_check(&self) -> Result<(), DeliveryError> {
        let failure = self.health_failure.lock().clone();
        self.record(CallKind::HealthCheck, None, None, None, failure.as_ref());
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultgate_provider::DynGateway;

    fn source() -> Location {
        Location::new("-100", 1)
    }

    #[tokio::test]
    async fn records_deliveries() {
        let gw = RecordingGateway::new("tg");
        let copy = Gateway::deliver(&gw, &source(), &SubjectId::new("a"))
            .await
            .unwrap();
        assert_eq!(copy.chat_id, "a");
        gw.assert_deliveries(1);
        gw.assert_delivered_to("a");
        assert_eq!(gw.delivery_attempts()[0].location, Some(source()));
    }

    #[tokio::test]
    async fn scripted_errors_then_success() {
        let gw = RecordingGateway::new("tg");
        gw.script_recipient("a", [DeliveryError::Connection("reset".into())]);
        let a = SubjectId::new("a");
        assert!(Gateway::deliver(&gw, &source(), &a).await.is_err());
        assert!(Gateway::deliver(&gw, &source(), &a).await.is_ok());
        assert_eq!(gw.delivered_to(), vec![a]);
    }

    #[tokio::test]
    async fn every_nth_failure() {
        let gw = RecordingGateway::new("tg")
            .with_failure_mode(FailureMode::EveryN(2, DeliveryError::Connection("x".into())));
        let mut results = Vec::new();
        for i in 0..4 {
            results.push(
                Gateway::deliver(&gw, &source(), &SubjectId::new(i.to_string()))
                    .await
                    .is_ok(),
            );
        }
        assert_eq!(results, vec![true, false, true, false]);
    }

    #[tokio::test]
    async fn usable_as_dyn_gateway() {
        let gw: std::sync::Arc<dyn DynGateway> = std::sync::Arc::new(RecordingGateway::new("tg"));
        assert_eq!(gw.name(), "tg");
        gw.health_check().await.unwrap();
        gw.delete(&source()).await.unwrap();
    }

    #[tokio::test]
    async fn relocate_targets_destination() {
        let gw = RecordingGateway::new("tg");
        let stored = Gateway::relocate(&gw, &source(), "-200").await.unwrap();
        assert_eq!(stored.chat_id, "-200");
        let calls = gw.calls_of(CallKind::Relocate);
        assert_eq!(calls[0].destination.as_deref(), Some("-200"));
    }
}
