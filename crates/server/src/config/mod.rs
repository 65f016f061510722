mod access;
mod background;
mod broadcast;
mod state;
mod telegram;
mod telemetry;

#[cfg(test)]
mod tests;

pub use access::*;
pub use background::*;
pub use broadcast::*;
pub use state::*;
pub use telegram::*;
pub use telemetry::*;

use std::path::Path;

use serde::Deserialize;
use vaultgate_gateway::{DEFAULT_NAMESPACE, check_namespace};

use crate::error::ServerError;

/// Environment variable that overrides `[telegram].bot_token`.
pub const BOT_TOKEN_ENV: &str = "VAULTGATE_BOT_TOKEN";

/// Top-level configuration for the Vaultgate daemon, loaded from a TOML file.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Prefix isolating this deployment's keys in the state store.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// State backend configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Telegram Bot API configuration.
    #[serde(default)]
    pub telegram: TelegramSection,
    /// Token validity, privileged subjects and auto-delete.
    #[serde(default)]
    pub access: AccessConfig,
    /// Broadcast pacing and retry bounds.
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    /// Background processing configuration.
    #[serde(default)]
    pub background: BackgroundProcessingConfig,
    /// Log output configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            state: StateConfig::default(),
            telegram: TelegramSection::default(),
            access: AccessConfig::default(),
            broadcast: BroadcastConfig::default(),
            background: BackgroundProcessingConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a configuration document. An empty document yields the defaults.
    pub fn from_toml(contents: &str) -> Result<Self, ServerError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        check_namespace(&self.namespace).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Load `path`, falling back to defaults when the file does not exist,
    /// then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let mut config = if path.exists() {
            Self::from_toml(&std::fs::read_to_string(path)?)?
        } else {
            Self::default()
        };
        config.apply_env(std::env::var(BOT_TOKEN_ENV).ok());
        Ok(config)
    }

    /// Apply the bot token override, if one was supplied.
    pub fn apply_env(&mut self, bot_token: Option<String>) {
        if let Some(token) = bot_token.filter(|t| !t.is_empty()) {
            self.telegram.bot_token = Some(token);
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}
