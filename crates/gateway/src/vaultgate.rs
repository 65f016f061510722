//! The engine facade wiring access control, content resolution, delivery,
//! broadcast and deferred deletion together.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use vaultgate_core::{
    AccessLink, AccessToken, BatchId, Clock, ContentReference, DEFAULT_TOKEN_VALIDITY_HOURS,
    LinkTarget, Location, LogicalId, Namespace, PrivilegeSource, SubjectId,
};
use vaultgate_executor::{DeliveryExecutor, ExecutorConfig, SendOutcome, Throttle};
use vaultgate_provider::DynGateway;

use crate::access::AccessTokenManager;
use crate::background::{BackgroundConfig, BackgroundProcessor, BackgroundProcessorBuilder};
use crate::broadcast::{BroadcastDispatcher, BroadcastHandle, BroadcastOptions, BroadcastSummary};
use crate::builder::VaultgateBuilder;
use crate::content::ContentStore;
use crate::deletion::DeletionScheduler;
use crate::error::GatewayError;
use crate::metrics::{GatewayMetrics, MetricsSnapshot};
use crate::recipients::{RecipientCounts, RecipientRegistry};

/// Deployment settings of the engine.
#[derive(Debug, Clone)]
pub struct VaultgateConfig {
    /// Lifetime of issued access tokens.
    pub token_validity: chrono::Duration,
    /// When set, delivered copies are deleted after this delay.
    pub auto_delete: Option<Duration>,
    /// Chat that imported content is relocated into. Without it content is
    /// registered where it already lives.
    pub storage_chat: Option<String>,
    /// Bot username used to render shareable links.
    pub bot_username: Option<String>,
    pub broadcast: BroadcastOptions,
    pub executor: ExecutorConfig,
}

impl Default for VaultgateConfig {
    fn default() -> Self {
        Self {
            token_validity: chrono::Duration::hours(DEFAULT_TOKEN_VALIDITY_HOURS),
            auto_delete: None,
            storage_chat: None,
            bot_username: None,
            broadcast: BroadcastOptions::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

/// Copies handed to a subject by one access request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    /// Delivered copies in source order.
    pub copies: Vec<Location>,
    /// When the copies will be deleted, if auto-delete is on.
    pub delete_at: Option<DateTime<Utc>>,
}

/// Result of importing a message.
#[derive(Debug, Clone)]
pub struct StoredContent {
    pub reference: ContentReference,
    pub link: AccessLink,
    /// Shareable URL, when a bot username is configured.
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultgateStats {
    pub recipients: RecipientCounts,
    pub content: usize,
    pub pending_deletions: usize,
    pub metrics: MetricsSnapshot,
}

/// The access-gated distribution engine.
pub struct Vaultgate {
    pub(crate) namespace: Namespace,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) privileges: Arc<dyn PrivilegeSource>,
    pub(crate) gateway: Arc<dyn DynGateway>,
    pub(crate) tokens: Arc<AccessTokenManager>,
    pub(crate) content: Arc<ContentStore>,
    pub(crate) recipients: Arc<RecipientRegistry>,
    pub(crate) deletions: Arc<DeletionScheduler>,
    pub(crate) dispatcher: Arc<BroadcastDispatcher>,
    pub(crate) executor: DeliveryExecutor,
    pub(crate) throttle: Throttle,
    pub(crate) metrics: Arc<GatewayMetrics>,
    pub(crate) config: VaultgateConfig,
}

impl Vaultgate {
    pub fn builder() -> VaultgateBuilder {
        VaultgateBuilder::new()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn config(&self) -> &VaultgateConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<AccessTokenManager> {
        &self.tokens
    }

    pub fn content(&self) -> &Arc<ContentStore> {
        &self.content
    }

    pub fn recipients(&self) -> &Arc<RecipientRegistry> {
        &self.recipients
    }

    pub fn deletions(&self) -> &Arc<DeletionScheduler> {
        &self.deletions
    }

    pub fn dispatcher(&self) -> &Arc<BroadcastDispatcher> {
        &self.dispatcher
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    pub fn gateway(&self) -> &Arc<dyn DynGateway> {
        &self.gateway
    }

    // -- request path -------------------------------------------------------

    /// Authorize `subject`, resolve `id` and deliver the content.
    #[instrument(skip(self, presented), fields(%subject, logical_id = %id))]
    pub async fn request_access(
        &self,
        subject: &SubjectId,
        id: &LogicalId,
        presented: Option<&str>,
    ) -> Result<Delivery, GatewayError> {
        self.admit(subject, presented).await?;
        let location = self.content.resolve(id).await?;
        self.deliver(subject, &[location]).await
    }

    /// Authorize `subject` and deliver every member of `batch` in order.
    #[instrument(skip(self, presented), fields(%subject, %batch))]
    pub async fn request_batch_access(
        &self,
        subject: &SubjectId,
        batch: &BatchId,
        presented: Option<&str>,
    ) -> Result<Delivery, GatewayError> {
        self.admit(subject, presented).await?;
        let locations = self.content.resolve_batch(batch).await?;
        self.deliver(subject, &locations).await
    }

    /// Run the access flow for a start-link payload.
    pub async fn open_link(
        &self,
        subject: &SubjectId,
        payload: &str,
    ) -> Result<Delivery, GatewayError> {
        let link = AccessLink::parse(payload)?;
        match &link.target {
            LinkTarget::Content(id) => {
                self.request_access(subject, id, link.token.as_deref())
                    .await
            }
            LinkTarget::Batch(batch) => {
                self.request_batch_access(subject, batch, link.token.as_deref())
                    .await
            }
        }
    }

    /// Mint a fresh token for `subject`, replacing the previous one.
    pub async fn issue_token(&self, subject: &SubjectId) -> Result<AccessToken, GatewayError> {
        self.recipients.register(subject).await?;
        let token = self.tokens.issue(subject).await?;
        self.metrics.increment_tokens_issued();
        Ok(token)
    }

    /// Mint a token and embed it in a link to `target`.
    pub async fn issue_link(
        &self,
        subject: &SubjectId,
        target: LinkTarget,
    ) -> Result<AccessLink, GatewayError> {
        let token = self.issue_token(subject).await?;
        Ok(AccessLink {
            target,
            token: Some(token.secret),
        })
    }

    /// Render a shareable URL for `link`.
    pub fn link_url(&self, link: &AccessLink) -> Option<String> {
        self.config
            .bot_username
            .as_deref()
            .map(|bot| link.url(bot))
    }

    async fn admit(&self, subject: &SubjectId, presented: Option<&str>) -> Result<(), GatewayError> {
        self.recipients.register(subject).await?;
        if self.recipients.is_banned(subject).await? {
            self.metrics.increment_access_denied();
            info!(%subject, "banned subject refused");
            return Err(GatewayError::Banned {
                subject: subject.clone(),
            });
        }
        if !self.tokens.validate(subject, presented).await {
            self.metrics.increment_access_denied();
            debug!(%subject, "no valid token presented");
            return Err(GatewayError::Unauthorized {
                subject: subject.clone(),
            });
        }
        self.metrics.increment_access_granted();
        Ok(())
    }

    /// Copy each source to `subject`, registering deletion obligations when
    /// auto-delete is on. Stops at the first failed copy; copies already
    /// delivered keep their obligations.
    async fn deliver(
        &self,
        subject: &SubjectId,
        sources: &[Location],
    ) -> Result<Delivery, GatewayError> {
        let delete_at = match self.config.auto_delete {
            Some(delay) => Some(
                self.clock.now()
                    + chrono::Duration::from_std(delay)
                        .map_err(|e| GatewayError::Configuration(e.to_string()))?,
            ),
            None => None,
        };

        let mut copies = Vec::with_capacity(sources.len());
        for source in sources {
            let report = self
                .executor
                .deliver(self.gateway.as_ref(), source, subject, &self.throttle)
                .await;
            match report.outcome {
                SendOutcome::Delivered(copy) => {
                    self.metrics.increment_deliveries();
                    if let Some(delay) = self.config.auto_delete {
                        self.deletions.schedule(copy.clone(), delay).await?;
                    }
                    copies.push(copy);
                }
                SendOutcome::Permanent(err)
                | SendOutcome::Exhausted(err)
                | SendOutcome::Fatal(err) => {
                    self.metrics.increment_delivery_failures();
                    return Err(GatewayError::Delivery(err));
                }
            }
        }

        if let Err(e) = self.recipients.touch(subject).await {
            debug!(%subject, error = %e, "failed to record activity");
        }
        Ok(Delivery { copies, delete_at })
    }

    // -- administration -----------------------------------------------------

    fn require_admin(&self, actor: &SubjectId) -> Result<(), GatewayError> {
        if self.privileges.is_admin(actor) {
            Ok(())
        } else {
            Err(GatewayError::Forbidden {
                subject: actor.clone(),
            })
        }
    }

    /// Import `source` into the backing store and register it.
    #[instrument(skip(self), fields(%actor, %source))]
    pub async fn store_content(
        &self,
        actor: &SubjectId,
        source: &Location,
        batch: Option<&BatchId>,
    ) -> Result<StoredContent, GatewayError> {
        self.require_admin(actor)?;
        let location = match &self.config.storage_chat {
            Some(chat) => self.gateway.relocate(source, chat).await?,
            None => source.clone(),
        };
        let reference = self.content.register(location, batch).await?;
        self.metrics.increment_content_registered();
        let link = AccessLink::content(reference.logical_id.clone());
        Ok(StoredContent {
            url: self.link_url(&link),
            reference,
            link,
        })
    }

    /// Start a batch; register members with [`store_content`](Self::store_content).
    pub fn open_batch(&self, actor: &SubjectId) -> Result<BatchId, GatewayError> {
        self.require_admin(actor)?;
        Ok(self.content.open_batch())
    }

    pub async fn remove_content(
        &self,
        actor: &SubjectId,
        id: &LogicalId,
    ) -> Result<bool, GatewayError> {
        self.require_admin(actor)?;
        Ok(self.content.remove(id).await?)
    }

    pub async fn ban(&self, actor: &SubjectId, subject: &SubjectId) -> Result<bool, GatewayError> {
        self.require_admin(actor)?;
        Ok(self.recipients.ban(subject).await?)
    }

    pub async fn unban(&self, actor: &SubjectId, subject: &SubjectId) -> Result<bool, GatewayError> {
        self.require_admin(actor)?;
        Ok(self.recipients.unban(subject).await?)
    }

    /// Send `source` to every registered, unbanned recipient and wait for
    /// the run to finish.
    pub async fn broadcast(
        &self,
        actor: &SubjectId,
        source: &Location,
    ) -> Result<BroadcastSummary, GatewayError> {
        self.require_admin(actor)?;
        let audience = self.recipients.audience().await?;
        Ok(self
            .dispatcher
            .broadcast(source, audience, &self.config.broadcast)
            .await?)
    }

    /// Like [`broadcast`](Self::broadcast) but runs on its own task and
    /// returns a handle for progress and cancellation.
    pub async fn start_broadcast(
        &self,
        actor: &SubjectId,
        source: Location,
    ) -> Result<BroadcastHandle, GatewayError> {
        self.require_admin(actor)?;
        let audience = self.recipients.audience().await?;
        Ok(self
            .dispatcher
            .spawn(source, audience, self.config.broadcast.clone()))
    }

    pub async fn stats(&self) -> Result<VaultgateStats, GatewayError> {
        Ok(VaultgateStats {
            recipients: self.recipients.count().await?,
            content: self.content.count().await?,
            pending_deletions: self.deletions.pending().await?.len(),
            metrics: self.metrics.snapshot(),
        })
    }

    /// A background processor driving this engine's deletions and token
    /// sweep.
    pub fn background(
        &self,
        config: BackgroundConfig,
    ) -> Result<(BackgroundProcessor, mpsc::Sender<()>), GatewayError> {
        BackgroundProcessorBuilder::new()
            .config(config)
            .deletions(Arc::clone(&self.deletions))
            .tokens(Arc::clone(&self.tokens))
            .metrics(Arc::clone(&self.metrics))
            .build()
            .map_err(|e| GatewayError::Configuration(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestGateway, manual_clock, memory_store};
    use vaultgate_core::{ManualClock, StaticPrivileges};
    use vaultgate_provider::DeliveryError;

    struct Fixture {
        vg: Vaultgate,
        gateway: Arc<TestGateway>,
        clock: Arc<ManualClock>,
    }

    fn admin() -> SubjectId {
        SubjectId::new("1")
    }

    fn fixture_with(configure: impl FnOnce(VaultgateBuilder) -> VaultgateBuilder) -> Fixture {
        let gateway = TestGateway::new();
        let clock = manual_clock();
        let builder = Vaultgate::builder()
            .namespace("test")
            .state(memory_store())
            .gateway(Arc::clone(&gateway) as Arc<dyn DynGateway>)
            .clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .privileges(Arc::new(StaticPrivileges::new(
                [admin()],
                [SubjectId::new("vip")],
            )))
            .storage_chat("-100")
            .bot_username("vault_bot");
        let vg = configure(builder).build().unwrap();
        Fixture { vg, gateway, clock }
    }

    fn fixture() -> Fixture {
        fixture_with(|b| b)
    }

    async fn stored(f: &Fixture) -> LogicalId {
        f.vg
            .store_content(&admin(), &Location::new("1", 55), None)
            .await
            .unwrap()
            .reference
            .logical_id
    }

    #[tokio::test]
    async fn token_grants_access_until_expiry() {
        let f = fixture();
        let id = stored(&f).await;
        let user = SubjectId::new("42");
        let token = f.vg.issue_token(&user).await.unwrap();

        let delivery = f
            .vg
            .request_access(&user, &id, Some(&token.secret))
            .await
            .unwrap();
        assert_eq!(delivery.copies.len(), 1);
        assert!(delivery.delete_at.is_none());

        f.clock
            .advance(chrono::Duration::hours(24) + chrono::Duration::seconds(1));
        let err = f
            .vg
            .request_access(&user, &id, Some(&token.secret))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn unauthorized_is_distinct_from_not_found() {
        let f = fixture();
        let user = SubjectId::new("42");
        let token = f.vg.issue_token(&user).await.unwrap();

        let missing = f
            .vg
            .request_access(&user, &LogicalId::new("ffff"), Some(&token.secret))
            .await
            .unwrap_err();
        assert!(missing.is_not_found());

        let id = stored(&f).await;
        let denied = f.vg.request_access(&user, &id, None).await.unwrap_err();
        assert!(denied.is_unauthorized());
        assert_eq!(f.vg.metrics().snapshot().access_denied, 1);
    }

    #[tokio::test]
    async fn privileged_subject_needs_no_token() {
        let f = fixture();
        let id = stored(&f).await;
        f.vg
            .request_access(&SubjectId::new("vip"), &id, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn banned_subject_is_refused_even_with_token() {
        let f = fixture();
        let id = stored(&f).await;
        let user = SubjectId::new("42");
        let token = f.vg.issue_token(&user).await.unwrap();
        f.vg.ban(&admin(), &user).await.unwrap();

        let err = f
            .vg
            .request_access(&user, &id, Some(&token.secret))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Banned { .. }));

        f.vg.unban(&admin(), &user).await.unwrap();
        f.vg
            .request_access(&user, &id, Some(&token.secret))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn store_content_relocates_into_storage_chat() {
        let f = fixture();
        let stored = f
            .vg
            .store_content(&admin(), &Location::new("1", 55), None)
            .await
            .unwrap();
        assert_eq!(stored.reference.location.chat_id, "-100");
        assert_eq!(f.gateway.relocated.lock().len(), 1);
        let url = stored.url.unwrap();
        assert!(url.starts_with("https://t.me/vault_bot?start=c_"));
    }

    #[tokio::test]
    async fn admin_operations_require_admin() {
        let f = fixture();
        let outsider = SubjectId::new("42");
        let err = f
            .vg
            .store_content(&outsider, &Location::new("1", 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Forbidden { .. }));
        assert!(f.vg.open_batch(&SubjectId::new("vip")).is_err());
        assert!(f.vg.ban(&outsider, &admin()).await.is_err());
    }

    #[tokio::test]
    async fn batch_link_delivers_in_order() {
        let f = fixture();
        let batch = f.vg.open_batch(&admin()).unwrap();
        for msg in [10, 11, 12] {
            f.vg
                .store_content(&admin(), &Location::new("1", msg), Some(&batch))
                .await
                .unwrap();
        }
        let user = SubjectId::new("42");
        let link = f
            .vg
            .issue_link(&user, LinkTarget::Batch(batch.clone()))
            .await
            .unwrap();
        let delivery = f.vg.open_link(&user, &link.to_payload()).await.unwrap();
        assert_eq!(delivery.copies.len(), 3);
        let expected = f.vg.content().resolve_batch(&batch).await.unwrap();
        assert_eq!(*f.gateway.sources.lock(), expected);
    }

    #[tokio::test]
    async fn malformed_link_is_rejected() {
        let f = fixture();
        let err = f
            .vg
            .open_link(&SubjectId::new("42"), "nonsense")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidLink(_)));
    }

    #[tokio::test]
    async fn auto_delete_schedules_each_copy() {
        let f = fixture_with(|b| b.auto_delete(Duration::from_secs(600)));
        let id = stored(&f).await;
        let delivery = f
            .vg
            .request_access(&SubjectId::new("vip"), &id, None)
            .await
            .unwrap();
        assert_eq!(
            delivery.delete_at,
            Some(f.clock.now() + chrono::Duration::minutes(10))
        );
        assert_eq!(f.vg.deletions().pending().await.unwrap().len(), 1);

        f.clock.advance(chrono::Duration::minutes(10));
        f.vg.deletions().tick().await.unwrap();
        assert_eq!(*f.gateway.deleted.lock(), delivery.copies);
    }

    #[tokio::test]
    async fn failed_delivery_surfaces_as_delivery_error() {
        let f = fixture();
        let id = stored(&f).await;
        f.gateway
            .always_fail("vip", DeliveryError::Recipient("bot was blocked".into()));
        let err = f
            .vg
            .request_access(&SubjectId::new("vip"), &id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Delivery(_)));
        assert_eq!(f.vg.metrics().snapshot().delivery_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_reaches_unbanned_recipients() {
        let f = fixture();
        for s in ["a", "b", "c"] {
            f.vg.issue_token(&SubjectId::new(s)).await.unwrap();
        }
        f.vg.ban(&admin(), &SubjectId::new("b")).await.unwrap();

        let summary = f
            .vg
            .broadcast(&admin(), &Location::new("1", 9))
            .await
            .unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert!(!f.gateway.delivered_to().contains(&SubjectId::new("b")));
    }

    #[tokio::test]
    async fn stats_reflect_activity() {
        let f = fixture_with(|b| b.auto_delete(Duration::from_secs(60)));
        let id = stored(&f).await;
        f.vg.issue_token(&SubjectId::new("a")).await.unwrap();
        f.vg
            .request_access(&SubjectId::new("vip"), &id, None)
            .await
            .unwrap();

        let stats = f.vg.stats().await.unwrap();
        assert_eq!(stats.recipients.total, 2);
        assert_eq!(stats.content, 1);
        assert_eq!(stats.pending_deletions, 1);
        assert_eq!(stats.metrics.tokens_issued, 1);
        assert_eq!(stats.metrics.deliveries, 1);
    }
}
