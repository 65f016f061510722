//! The access-gated distribution engine.
//!
//! [`Vaultgate`] is the entry point. It gates content behind per-subject
//! access tokens, resolves opaque logical ids to stored messages, delivers
//! copies through a [`DynGateway`](vaultgate_provider::DynGateway), fans
//! messages out to every registered recipient in rate-limited waves and
//! deletes ephemeral copies once they are due.

pub mod access;
pub mod background;
pub mod broadcast;
pub mod builder;
pub mod content;
pub mod deletion;
pub mod error;
pub mod metrics;
pub mod recipients;
pub mod vaultgate;

#[cfg(test)]
pub(crate) mod test_support;

pub use access::AccessTokenManager;
pub use background::{BackgroundConfig, BackgroundProcessor, BackgroundProcessorBuilder};
pub use broadcast::{
    BroadcastDispatcher, BroadcastHandle, BroadcastOptions, BroadcastProgress, BroadcastSummary,
};
pub use builder::{DEFAULT_NAMESPACE, VaultgateBuilder, check_namespace};
pub use content::ContentStore;
pub use deletion::{DeletionScheduler, TickReport};
pub use error::{BroadcastError, GatewayError};
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use recipients::{RecipientCounts, RecipientRegistry};
pub use vaultgate::{Delivery, StoredContent, Vaultgate, VaultgateConfig, VaultgateStats};
