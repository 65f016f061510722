//! Access token issuance and validation.
//!
//! A subject holds at most one token. Issuing a new one replaces the old
//! record in place, so a superseded secret stops validating immediately.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use vaultgate_core::{AccessToken, Clock, Namespace, PrivilegeSource, SubjectId};
use vaultgate_state::{KeyKind, StateError, StateKey, StateStore};

/// Issues and checks per-subject access tokens.
pub struct AccessTokenManager {
    state: Arc<dyn StateStore>,
    namespace: Namespace,
    clock: Arc<dyn Clock>,
    privileges: Arc<dyn PrivilegeSource>,
    validity: Duration,
}

impl AccessTokenManager {
    pub fn new(
        state: Arc<dyn StateStore>,
        namespace: Namespace,
        clock: Arc<dyn Clock>,
        privileges: Arc<dyn PrivilegeSource>,
        validity: Duration,
    ) -> Self {
        Self {
            state,
            namespace,
            clock,
            privileges,
            validity,
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    fn key(&self, subject: &SubjectId) -> StateKey {
        StateKey::new(self.namespace.clone(), KeyKind::Token, subject.as_str())
    }

    /// Mint a fresh token for `subject`, replacing any previous one.
    ///
    /// Privileged subjects may be issued tokens too; they simply never need
    /// them.
    pub async fn issue(&self, subject: &SubjectId) -> Result<AccessToken, StateError> {
        let token = AccessToken::mint(subject.clone(), self.clock.now(), self.validity);
        let key = self.key(subject);
        let body =
            serde_json::to_string(&token).map_err(|e| StateError::Serialization(e.to_string()))?;
        self.state.set(&key, &body, None).await?;
        self.state
            .index_timeout(&key, token.expires_at.timestamp_millis())
            .await?;
        info!(%subject, expires_at = %token.expires_at, "access token issued");
        Ok(token)
    }

    /// The subject's current token record, live or not.
    pub async fn current(&self, subject: &SubjectId) -> Result<Option<AccessToken>, StateError> {
        self.load(&self.key(subject)).await
    }

    async fn load(&self, key: &StateKey) -> Result<Option<AccessToken>, StateError> {
        let Some(raw) = self.state.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StateError::Serialization(e.to_string()))
    }

    /// Whether `subject` bypasses token checks.
    pub fn is_privileged(&self, subject: &SubjectId) -> bool {
        self.privileges.is_privileged(subject)
    }

    /// Check a presented secret.
    ///
    /// Never fails: a store error denies access and is logged. Expiry is
    /// strict, so a token is dead at exactly `expires_at`.
    pub async fn validate(&self, subject: &SubjectId, presented: Option<&str>) -> bool {
        if self.is_privileged(subject) {
            return true;
        }
        let Some(presented) = presented else {
            return false;
        };
        match self.current(subject).await {
            Ok(Some(token)) => token.accepts(presented, self.clock.now()),
            Ok(None) => false,
            Err(e) => {
                warn!(%subject, error = %e, "token lookup failed, denying access");
                false
            }
        }
    }

    /// Delete the subject's token. Returns `true` if one existed.
    pub async fn revoke(&self, subject: &SubjectId) -> Result<bool, StateError> {
        let key = self.key(subject);
        self.state.remove_timeout_index(&key).await?;
        self.state.delete(&key).await
    }

    /// Remove token records whose expiry has passed. Returns how many were
    /// removed.
    pub async fn sweep_expired(&self) -> Result<usize, StateError> {
        let now = self.clock.now();
        let due = self
            .state
            .get_expired_timeouts(KeyKind::Token, now.timestamp_millis())
            .await?;

        let mut removed = 0;
        for canonical in due {
            let Some(key) = StateKey::parse_canonical(&canonical) else {
                continue;
            };
            if key.namespace != self.namespace {
                continue;
            }
            match self.load(&key).await {
                Ok(Some(token)) if token.is_live_at(now) => {
                    // Re-issued after the index was read.
                    self.state
                        .index_timeout(&key, token.expires_at.timestamp_millis())
                        .await?;
                }
                Ok(_) => {
                    self.state.delete(&key).await?;
                    self.state.remove_timeout_index(&key).await?;
                    removed += 1;
                }
                Err(e) => {
                    debug!(key = %canonical, error = %e, "unreadable token record, dropping");
                    self.state.delete(&key).await?;
                    self.state.remove_timeout_index(&key).await?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            info!(removed, "expired tokens swept");
        }
        Ok(removed)
    }
}
