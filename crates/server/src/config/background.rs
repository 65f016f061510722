use serde::Deserialize;

/// Configuration for the background processor (deletions, token sweep).
#[derive(Debug, Deserialize)]
pub struct BackgroundProcessingConfig {
    /// Whether deferred deletions are processed.
    #[serde(default = "default_enable_deletions")]
    pub enable_deletions: bool,
    /// How often to poll for due deletions (seconds).
    #[serde(default = "default_deletion_poll_interval")]
    pub deletion_poll_interval_seconds: u64,
    /// Whether expired tokens are swept from the store.
    #[serde(default)]
    pub enable_token_sweep: bool,
    /// How often to sweep expired tokens (seconds).
    #[serde(default = "default_token_sweep_interval")]
    pub token_sweep_interval_seconds: u64,
}

impl Default for BackgroundProcessingConfig {
    fn default() -> Self {
        Self {
            enable_deletions: default_enable_deletions(),
            deletion_poll_interval_seconds: default_deletion_poll_interval(),
            enable_token_sweep: false,
            token_sweep_interval_seconds: default_token_sweep_interval(),
        }
    }
}

fn default_enable_deletions() -> bool {
    true
}

fn default_deletion_poll_interval() -> u64 {
    60
}

fn default_token_sweep_interval() -> u64 {
    3600
}
