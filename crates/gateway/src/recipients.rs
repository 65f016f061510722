//! Registered recipients: the audience of broadcasts.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use vaultgate_core::{Clock, Namespace, Recipient, SubjectId};
use vaultgate_state::{KeyKind, StateError, StateKey, StateStore};

/// Head counts over the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecipientCounts {
    pub total: usize,
    pub banned: usize,
}

impl RecipientCounts {
    /// Recipients a broadcast would address.
    pub fn reachable(&self) -> usize {
        self.total - self.banned
    }
}

pub struct RecipientRegistry {
    state: Arc<dyn StateStore>,
    namespace: Namespace,
    clock: Arc<dyn Clock>,
}

impl RecipientRegistry {
    pub fn new(state: Arc<dyn StateStore>, namespace: Namespace, clock: Arc<dyn Clock>) -> Self {
        Self {
            state,
            namespace,
            clock,
        }
    }

    fn key(&self, subject: &SubjectId) -> StateKey {
        StateKey::new(self.namespace.clone(), KeyKind::Recipient, subject.as_str())
    }

    async fn save(&self, recipient: &Recipient) -> Result<(), StateError> {
        let body = serde_json::to_string(recipient)
            .map_err(|e| StateError::Serialization(e.to_string()))?;
        self.state.set(&self.key(&recipient.subject), &body, None).await
    }

    /// Add `subject` on first contact. Returns `true` if it was new.
    pub async fn register(&self, subject: &SubjectId) -> Result<bool, StateError> {
        let recipient = Recipient::new(subject.clone(), self.clock.now());
        let body = serde_json::to_string(&recipient)
            .map_err(|e| StateError::Serialization(e.to_string()))?;
        let created = self
            .state
            .check_and_set(&self.key(subject), &body, None)
            .await?;
        if created {
            info!(%subject, "recipient registered");
        }
        Ok(created)
    }

    pub async fn get(&self, subject: &SubjectId) -> Result<Option<Recipient>, StateError> {
        let Some(raw) = self.state.get(&self.key(subject)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StateError::Serialization(e.to_string()))
    }

    /// Record activity. Unknown subjects are left alone.
    pub async fn touch(&self, subject: &SubjectId) -> Result<(), StateError> {
        if let Some(mut recipient) = self.get(subject).await? {
            recipient.last_active_at = Some(self.clock.now());
            self.save(&recipient).await?;
        }
        Ok(())
    }

    /// Drop `subject` from the registry. Returns `true` if it was present.
    pub async fn remove(&self, subject: &SubjectId) -> Result<bool, StateError> {
        self.state.delete(&self.key(subject)).await
    }

    /// Mark `subject` banned, registering it if unknown so the ban sticks.
    /// Returns `true` if the flag changed.
    pub async fn ban(&self, subject: &SubjectId) -> Result<bool, StateError> {
        self.set_banned(subject, true).await
    }

    pub async fn unban(&self, subject: &SubjectId) -> Result<bool, StateError> {
        self.set_banned(subject, false).await
    }

    async fn set_banned(&self, subject: &SubjectId, banned: bool) -> Result<bool, StateError> {
        let mut recipient = match self.get(subject).await? {
            Some(recipient) => recipient,
            None if banned => Recipient::new(subject.clone(), self.clock.now()),
            None => return Ok(false),
        };
        if recipient.banned == banned {
            return Ok(false);
        }
        recipient.banned = banned;
        self.save(&recipient).await?;
        info!(%subject, banned, "recipient ban updated");
        Ok(true)
    }

    pub async fn is_banned(&self, subject: &SubjectId) -> Result<bool, StateError> {
        Ok(self.get(subject).await?.is_some_and(|r| r.banned))
    }

    /// All recipients ordered by join time.
    pub async fn list(&self) -> Result<Vec<Recipient>, StateError> {
        let entries = self
            .state
            .scan_keys(&self.namespace, KeyKind::Recipient, None)
            .await?;
        let mut recipients = entries
            .into_iter()
            .map(|(_, raw)| {
                serde_json::from_str::<Recipient>(&raw)
                    .map_err(|e| StateError::Serialization(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        recipients.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.subject.cmp(&b.subject))
        });
        Ok(recipients)
    }

    /// Subjects a broadcast should address right now: everyone not banned.
    pub async fn audience(&self) -> Result<Vec<SubjectId>, StateError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| !r.banned)
            .map(|r| r.subject)
            .collect())
    }

    pub async fn count(&self) -> Result<RecipientCounts, StateError> {
        let recipients = self.list().await?;
        Ok(RecipientCounts {
            total: recipients.len(),
            banned: recipients.iter().filter(|r| r.banned).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{manual_clock, memory_store};
    use chrono::Duration;
    use vaultgate_core::ManualClock;

    fn registry(clock: Arc<ManualClock>) -> RecipientRegistry {
        RecipientRegistry::new(memory_store(), Namespace::new("test"), clock)
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let clock = manual_clock();
        let reg = registry(Arc::clone(&clock));
        let alice = SubjectId::new("alice");
        assert!(reg.register(&alice).await.unwrap());
        let joined = reg.get(&alice).await.unwrap().unwrap().joined_at;

        clock.advance(Duration::minutes(5));
        assert!(!reg.register(&alice).await.unwrap());
        assert_eq!(reg.get(&alice).await.unwrap().unwrap().joined_at, joined);
    }

    #[tokio::test]
    async fn touch_records_activity() {
        let clock = manual_clock();
        let reg = registry(Arc::clone(&clock));
        let alice = SubjectId::new("alice");
        reg.register(&alice).await.unwrap();
        clock.advance(Duration::minutes(1));
        reg.touch(&alice).await.unwrap();
        assert_eq!(
            reg.get(&alice).await.unwrap().unwrap().last_active_at,
            Some(clock.now())
        );

        reg.touch(&SubjectId::new("ghost")).await.unwrap();
        assert!(reg.get(&SubjectId::new("ghost")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ban_and_unban() {
        let reg = registry(manual_clock());
        let alice = SubjectId::new("alice");
        reg.register(&alice).await.unwrap();

        assert!(reg.ban(&alice).await.unwrap());
        assert!(!reg.ban(&alice).await.unwrap());
        assert!(reg.is_banned(&alice).await.unwrap());
        assert!(reg.audience().await.unwrap().is_empty());

        assert!(reg.unban(&alice).await.unwrap());
        assert!(!reg.is_banned(&alice).await.unwrap());
        assert_eq!(reg.audience().await.unwrap(), vec![alice]);
    }

    #[tokio::test]
    async fn banning_unknown_subject_registers_it() {
        let reg = registry(manual_clock());
        let mallory = SubjectId::new("mallory");
        assert!(reg.ban(&mallory).await.unwrap());
        assert!(reg.is_banned(&mallory).await.unwrap());
        assert!(!reg.unban(&SubjectId::new("nobody")).await.unwrap());
    }

    #[tokio::test]
    async fn list_orders_by_join_time() {
        let clock = manual_clock();
        let reg = registry(Arc::clone(&clock));
        for name in ["c", "a", "b"] {
            reg.register(&SubjectId::new(name)).await.unwrap();
            clock.advance(Duration::seconds(1));
        }
        let order: Vec<String> = reg
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.subject.to_string())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn counts_and_remove() {
        let reg = registry(manual_clock());
        for name in ["a", "b", "c"] {
            reg.register(&SubjectId::new(name)).await.unwrap();
        }
        reg.ban(&SubjectId::new("b")).await.unwrap();
        let counts = reg.count().await.unwrap();
        assert_eq!(counts, RecipientCounts { total: 3, banned: 1 });
        assert_eq!(counts.reachable(), 2);

        assert!(reg.remove(&SubjectId::new("a")).await.unwrap());
        assert!(!reg.remove(&SubjectId::new("a")).await.unwrap());
        assert_eq!(reg.count().await.unwrap().total, 2);
    }
}
