use std::time::Duration;

use async_trait::async_trait;

use crate::error::StateError;
use crate::key::{KeyKind, StateKey};

/// Key-value persistence injected into every engine component.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// Writes to the same key are serialized by the backend; writes to
/// different keys are independent.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Check if a key exists; if not, set it atomically with an optional TTL.
    /// Returns `true` if the key was newly set, `false` if it already existed.
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError>;

    /// Get the value for a key. Returns `None` if not found or expired.
    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError>;

    /// Set a value with an optional TTL, overwriting any previous value.
    async fn set(&self, key: &StateKey, value: &str, ttl: Option<Duration>)
    -> Result<(), StateError>;

    /// Delete a key. Returns `true` if the key existed.
    async fn delete(&self, key: &StateKey) -> Result<bool, StateError>;

    /// Atomically increment a counter by `delta`. Returns the new value.
    /// Creates the counter at 0 if it doesn't exist before incrementing.
    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError>;

    /// Scan live keys of `kind` in `namespace`, optionally restricted to ids
    /// starting with `prefix`.
    ///
    /// Returns `(canonical key, value)` pairs in no particular order.
    async fn scan_keys(
        &self,
        namespace: &str,
        kind: KeyKind,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, String)>, StateError>;

    /// Add a key to the due-time index of its kind. `due_at_ms` is a Unix
    /// timestamp in milliseconds. Re-indexing a key replaces its previous due
    /// time.
    async fn index_timeout(&self, key: &StateKey, due_at_ms: i64) -> Result<(), StateError>;

    /// Remove a key from the due-time index.
    async fn remove_timeout_index(&self, key: &StateKey) -> Result<(), StateError>;

    /// Canonical keys of `kind` whose due time is `<= now_ms`, oldest first.
    ///
    /// Each kind has its own index, so a range query never reads entries
    /// another kind has indexed.
    async fn get_expired_timeouts(
        &self,
        kind: KeyKind,
        now_ms: i64,
    ) -> Result<Vec<String>, StateError>;
}
