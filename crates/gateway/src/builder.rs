use std::sync::Arc;
use std::time::Duration;

use vaultgate_core::{Clock, Namespace, PrivilegeSource, StaticPrivileges, SystemClock};
use vaultgate_executor::{DeliveryExecutor, ExecutorConfig, Throttle};
use vaultgate_provider::DynGateway;
use vaultgate_state::StateStore;

use crate::access::AccessTokenManager;
use crate::broadcast::{BroadcastDispatcher, BroadcastOptions};
use crate::content::ContentStore;
use crate::deletion::DeletionScheduler;
use crate::error::GatewayError;
use crate::metrics::GatewayMetrics;
use crate::recipients::RecipientRegistry;
use crate::vaultgate::{Vaultgate, VaultgateConfig};

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "vaultgate";

/// Builder for constructing a [`Vaultgate`] with its collaborators.
#[derive(Default)]
pub struct VaultgateBuilder {
    namespace: Option<Namespace>,
    state: Option<Arc<dyn StateStore>>,
    gateway: Option<Arc<dyn DynGateway>>,
    clock: Option<Arc<dyn Clock>>,
    privileges: Option<Arc<dyn PrivilegeSource>>,
    metrics: Option<Arc<GatewayMetrics>>,
    config: VaultgateConfig,
}

impl VaultgateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<Namespace>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: Arc<dyn StateStore>) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn gateway(mut self, gateway: Arc<dyn DynGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Override the wall clock. Defaults to [`SystemClock`].
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn privileges(mut self, privileges: Arc<dyn PrivilegeSource>) -> Self {
        self.privileges = Some(privileges);
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn config(mut self, config: VaultgateConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn token_validity(mut self, validity: chrono::Duration) -> Self {
        self.config.token_validity = validity;
        self
    }

    /// Delete every delivered copy once `after` has passed.
    #[must_use]
    pub fn auto_delete(mut self, after: Duration) -> Self {
        self.config.auto_delete = Some(after);
        self
    }

    /// Chat that imported content is relocated into.
    #[must_use]
    pub fn storage_chat(mut self, chat: impl Into<String>) -> Self {
        self.config.storage_chat = Some(chat.into());
        self
    }

    #[must_use]
    pub fn bot_username(mut self, username: impl Into<String>) -> Self {
        self.config.bot_username = Some(username.into());
        self
    }

    #[must_use]
    pub fn broadcast_options(mut self, options: BroadcastOptions) -> Self {
        self.config.broadcast = options;
        self
    }

    #[must_use]
    pub fn executor_config(mut self, config: ExecutorConfig) -> Self {
        self.config.executor = config;
        self
    }

    pub fn build(self) -> Result<Vaultgate, GatewayError> {
        let state = self
            .state
            .ok_or_else(|| GatewayError::Configuration("state store is required".into()))?;
        let gateway = self
            .gateway
            .ok_or_else(|| GatewayError::Configuration("delivery gateway is required".into()))?;
        if self.config.token_validity <= chrono::Duration::zero() {
            return Err(GatewayError::Configuration(
                "token validity must be positive".into(),
            ));
        }
        if self.config.broadcast.wave_size == 0 {
            return Err(GatewayError::Configuration(
                "broadcast wave size must be at least 1".into(),
            ));
        }

        let namespace = self
            .namespace
            .unwrap_or_else(|| Namespace::new(DEFAULT_NAMESPACE));
        check_namespace(&namespace)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let privileges = self
            .privileges
            .unwrap_or_else(|| Arc::new(StaticPrivileges::default()));
        let metrics = self.metrics.unwrap_or_default();
        let executor = DeliveryExecutor::new(self.config.executor.clone());

        let tokens = Arc::new(AccessTokenManager::new(
            Arc::clone(&state),
            namespace.clone(),
            Arc::clone(&clock),
            Arc::clone(&privileges),
            self.config.token_validity,
        ));
        let content = Arc::new(ContentStore::new(
            Arc::clone(&state),
            namespace.clone(),
            Arc::clone(&clock),
        ));
        let recipients = Arc::new(RecipientRegistry::new(
            Arc::clone(&state),
            namespace.clone(),
            Arc::clone(&clock),
        ));
        let deletions = Arc::new(
            DeletionScheduler::new(
                Arc::clone(&state),
                namespace.clone(),
                Arc::clone(&clock),
                Arc::clone(&gateway),
                Arc::clone(&metrics),
            )
            .with_delete_timeout(self.config.executor.send_timeout),
        );
        let dispatcher = Arc::new(BroadcastDispatcher::new(
            Arc::clone(&gateway),
            Arc::clone(&recipients),
            executor.clone(),
            Arc::clone(&metrics),
        ));

        Ok(Vaultgate {
            namespace,
            clock,
            privileges,
            gateway,
            tokens,
            content,
            recipients,
            deletions,
            dispatcher,
            executor,
            throttle: Throttle::unlimited(),
            metrics,
            config: self.config,
        })
    }
}

/// State keys are rendered as `namespace:kind:id` and parsed back by
/// splitting on `:`, so a namespace must be non-empty and colon-free.
pub fn check_namespace(namespace: &str) -> Result<(), GatewayError> {
    if namespace.is_empty() {
        return Err(GatewayError::Configuration("namespace must not be empty".into()));
    }
    if namespace.contains(':') {
        return Err(GatewayError::Configuration(format!(
            "namespace {namespace:?} must not contain ':'"
        )));
    }
    Ok(())
}
