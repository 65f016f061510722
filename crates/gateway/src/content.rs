//! Logical id to physical location mapping, with ordered batches.

use std::sync::Arc;

use tracing::{debug, info};

use vaultgate_core::{BatchId, Clock, ContentReference, Location, LogicalId, Namespace};
use vaultgate_state::{KeyKind, StateError, StateKey, StateStore};

use crate::error::GatewayError;

/// Attempts at drawing an unused id before giving up. With 128-bit ids a
/// second attempt is already astronomically unlikely.
const MAX_ID_ATTEMPTS: usize = 4;

/// Width of the zero-padded position in batch member keys, so lexical key
/// order equals insertion order.
const POSITION_WIDTH: usize = 10;

pub struct ContentStore {
    state: Arc<dyn StateStore>,
    namespace: Namespace,
    clock: Arc<dyn Clock>,
}

impl ContentStore {
    pub fn new(state: Arc<dyn StateStore>, namespace: Namespace, clock: Arc<dyn Clock>) -> Self {
        Self {
            state,
            namespace,
            clock,
        }
    }

    fn content_key(&self, id: &LogicalId) -> StateKey {
        StateKey::new(self.namespace.clone(), KeyKind::Content, id.as_str())
    }

    fn member_key(&self, batch: &BatchId, position: u64) -> StateKey {
        StateKey::new(
            self.namespace.clone(),
            KeyKind::BatchMember,
            format!("{batch}:{position:0width$}", width = POSITION_WIDTH),
        )
    }

    fn sequence_key(&self, batch: &BatchId) -> StateKey {
        StateKey::new(
            self.namespace.clone(),
            KeyKind::Counter,
            format!("batch_seq:{batch}"),
        )
    }

    /// Start a new batch. Batches exist once their first member is registered.
    pub fn open_batch(&self) -> BatchId {
        BatchId::generate()
    }

    /// Register `location` under a fresh logical id, optionally appending it
    /// to `batch`.
    pub async fn register(
        &self,
        location: Location,
        batch: Option<&BatchId>,
    ) -> Result<ContentReference, StateError> {
        let position = match batch {
            Some(batch) => {
                let seq = self.state.increment(&self.sequence_key(batch), 1, None).await?;
                Some(u64::try_from(seq).map_err(|e| StateError::Backend(e.to_string()))?)
            }
            None => None,
        };

        for _ in 0..MAX_ID_ATTEMPTS {
            let reference = ContentReference {
                logical_id: LogicalId::generate(),
                location: location.clone(),
                batch_id: batch.cloned(),
                position,
                registered_at: self.clock.now(),
            };
            let body = serde_json::to_string(&reference)
                .map_err(|e| StateError::Serialization(e.to_string()))?;
            let key = self.content_key(&reference.logical_id);
            if !self.state.check_and_set(&key, &body, None).await? {
                debug!(id = %reference.logical_id, "logical id collision, drawing again");
                continue;
            }
            if let (Some(batch), Some(position)) = (batch, position) {
                self.state
                    .set(
                        &self.member_key(batch, position),
                        reference.logical_id.as_str(),
                        None,
                    )
                    .await?;
            }
            info!(id = %reference.logical_id, %location, "content registered");
            return Ok(reference);
        }
        Err(StateError::Backend(
            "could not allocate an unused logical id".into(),
        ))
    }

    pub async fn get(&self, id: &LogicalId) -> Result<Option<ContentReference>, StateError> {
        let Some(raw) = self.state.get(&self.content_key(id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StateError::Serialization(e.to_string()))
    }

    /// Physical location of a logical id.
    pub async fn resolve(&self, id: &LogicalId) -> Result<Location, GatewayError> {
        self.get(id)
            .await?
            .map(|reference| reference.location)
            .ok_or_else(|| GatewayError::ContentNotFound(id.clone()))
    }

    /// Logical ids of a batch in registration order.
    pub async fn batch_members(&self, batch: &BatchId) -> Result<Vec<LogicalId>, StateError> {
        let prefix = format!("{batch}:");
        let mut entries = self
            .state
            .scan_keys(&self.namespace, KeyKind::BatchMember, Some(&prefix))
            .await?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries
            .into_iter()
            .map(|(_, id)| LogicalId::new(id))
            .collect())
    }

    /// Locations of a batch in registration order. Members removed since
    /// registration are skipped; a batch with no live members is not found.
    pub async fn resolve_batch(&self, batch: &BatchId) -> Result<Vec<Location>, GatewayError> {
        let mut locations = Vec::new();
        for id in self.batch_members(batch).await? {
            if let Some(reference) = self.get(&id).await? {
                locations.push(reference.location);
            }
        }
        if locations.is_empty() {
            return Err(GatewayError::BatchNotFound(batch.clone()));
        }
        Ok(locations)
    }

    /// Forget a logical id. Returns `true` if it existed.
    pub async fn remove(&self, id: &LogicalId) -> Result<bool, StateError> {
        let Some(reference) = self.get(id).await? else {
            return Ok(false);
        };
        if let (Some(batch), Some(position)) = (&reference.batch_id, reference.position) {
            self.state.delete(&self.member_key(batch, position)).await?;
        }
        self.state.delete(&self.content_key(id)).await
    }

    /// Number of registered content references.
    pub async fn count(&self) -> Result<usize, StateError> {
        Ok(self
            .state
            .scan_keys(&self.namespace, KeyKind::Content, None)
            .await?
            .len())
    }
}
