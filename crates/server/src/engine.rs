//! Wiring from [`ServerConfig`] to a running [`Vaultgate`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use vaultgate_core::{PrivilegeSource, StaticPrivileges, SubjectId};
use vaultgate_executor::{ExecutorConfig, RetryStrategy, ThroughputWindow};
use vaultgate_gateway::{BackgroundConfig, BroadcastOptions, Vaultgate};
use vaultgate_provider::{DynGateway, LogGateway};
use vaultgate_state::StateStore;
use vaultgate_telegram::{TelegramConfig, TelegramGateway};

use crate::config::{
    AccessConfig, BOT_TOKEN_ENV, BackgroundProcessingConfig, BroadcastConfig, ServerConfig,
    TelegramSection,
};
use crate::error::ServerError;

/// Build the platform gateway. Dry-run mode swaps in a [`LogGateway`].
pub fn create_gateway(config: &TelegramSection) -> Result<Arc<dyn DynGateway>, ServerError> {
    if config.dry_run {
        warn!("dry run: platform calls are logged, not performed");
        return Ok(Arc::new(LogGateway::new("dry-run")));
    }
    let token = config.bot_token.as_deref().ok_or_else(|| {
        ServerError::Config(format!(
            "a bot token is required; set [telegram].bot_token or {BOT_TOKEN_ENV}"
        ))
    })?;
    let telegram = TelegramConfig::new(token)
        .with_api_base_url(config.api_base_url.clone())
        .with_request_timeout(Duration::from_secs(config.request_timeout_seconds))
        .with_protect_content(config.protect_content);
    Ok(Arc::new(TelegramGateway::new(telegram)?))
}

pub fn broadcast_options(config: &BroadcastConfig) -> BroadcastOptions {
    let window = (config.max_sends_per_window > 0).then(|| {
        ThroughputWindow::new(
            config.max_sends_per_window,
            Duration::from_millis(config.window_ms),
        )
    });
    BroadcastOptions {
        wave_size: config.wave_size,
        wave_interval: Duration::from_millis(config.wave_interval_ms),
        window,
        prune_permanent: config.prune_unreachable,
        update_last_active: config.update_last_active,
    }
}

pub fn executor_config(config: &BroadcastConfig) -> ExecutorConfig {
    let base = Duration::from_millis(config.retry_base_ms);
    ExecutorConfig {
        max_transient_retries: config.max_transient_retries,
        max_rate_limit_retries: config.max_rate_limit_retries,
        retry_strategy: RetryStrategy::Exponential {
            base,
            max: base * 50,
            multiplier: 2.0,
        },
        send_timeout: Duration::from_secs(config.send_timeout_seconds),
    }
}

pub fn background_config(config: &BackgroundProcessingConfig) -> BackgroundConfig {
    BackgroundConfig {
        deletion_poll_interval: Duration::from_secs(config.deletion_poll_interval_seconds),
        enable_deletions: config.enable_deletions,
        token_sweep_interval: Duration::from_secs(config.token_sweep_interval_seconds),
        enable_token_sweep: config.enable_token_sweep,
    }
}

pub fn token_validity(config: &AccessConfig) -> Result<chrono::Duration, ServerError> {
    chrono::Duration::try_hours(config.token_validity_hours).ok_or_else(|| {
        ServerError::Config(format!(
            "[access].token_validity_hours = {} is out of range",
            config.token_validity_hours
        ))
    })
}

/// `None` when unset or zero.
pub fn auto_delete(config: &AccessConfig) -> Result<Option<Duration>, ServerError> {
    let Some(minutes) = config.auto_delete_minutes.filter(|m| *m > 0) else {
        return Ok(None);
    };
    minutes
        .checked_mul(60)
        .map(|secs| Some(Duration::from_secs(secs)))
        .ok_or_else(|| {
            ServerError::Config(format!(
                "[access].auto_delete_minutes = {minutes} is out of range"
            ))
        })
}

/// The identity administrative subcommands act as.
pub fn operator(config: &ServerConfig) -> Result<SubjectId, ServerError> {
    config
        .access
        .admins
        .first()
        .map(SubjectId::new)
        .ok_or_else(|| ServerError::Config("[access].admins must name at least one admin".into()))
}

/// Assemble the engine from configuration and its external dependencies.
pub fn create_vaultgate(
    config: &ServerConfig,
    state: Arc<dyn StateStore>,
    gateway: Arc<dyn DynGateway>,
) -> Result<Vaultgate, ServerError> {
    let privileges: Arc<dyn PrivilegeSource> = Arc::new(StaticPrivileges::new(
        config.access.admins.iter().map(SubjectId::new),
        config.access.exempt.iter().map(SubjectId::new),
    ));

    let mut builder = Vaultgate::builder()
        .namespace(config.namespace.as_str())
        .state(state)
        .gateway(gateway)
        .privileges(privileges)
        .token_validity(token_validity(&config.access)?)
        .broadcast_options(broadcast_options(&config.broadcast))
        .executor_config(executor_config(&config.broadcast));

    if let Some(after) = auto_delete(&config.access)? {
        builder = builder.auto_delete(after);
    }
    if let Some(chat) = &config.telegram.storage_chat {
        builder = builder.storage_chat(chat.as_str());
    }
    if let Some(bot) = &config.telegram.bot_username {
        builder = builder.bot_username(bot.as_str());
    }

    let vaultgate = builder.build()?;
    info!(
        namespace = %config.namespace,
        admins = config.access.admins.len(),
        exempt = config.access.exempt.len(),
        auto_delete = ?vaultgate.config().auto_delete,
        "vaultgate engine assembled"
    );
    Ok(vaultgate)
}
