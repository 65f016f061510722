use serde::Deserialize;

/// Broadcast pacing and per-send retry bounds.
#[derive(Debug, Deserialize)]
pub struct BroadcastConfig {
    /// Sends dispatched concurrently per wave.
    #[serde(default = "default_wave_size")]
    pub wave_size: usize,
    /// Pause between consecutive waves, in milliseconds.
    #[serde(default = "default_wave_interval_ms")]
    pub wave_interval_ms: u64,
    /// Maximum send attempts per `window_ms`. Zero disables the window.
    #[serde(default = "default_max_sends")]
    pub max_sends_per_window: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Retries after a transient failure.
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,
    /// Retries after a rate-limit signal.
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
    /// Base backoff between transient retries, in milliseconds.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    /// Upper bound on one send, in seconds.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_seconds: u64,
    /// Remove permanently unreachable recipients.
    #[serde(default = "default_true")]
    pub prune_unreachable: bool,
    /// Refresh `last_active_at` of recipients that received the message.
    #[serde(default = "default_true")]
    pub update_last_active: bool,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            wave_size: default_wave_size(),
            wave_interval_ms: default_wave_interval_ms(),
            max_sends_per_window: default_max_sends(),
            window_ms: default_window_ms(),
            max_transient_retries: default_max_transient_retries(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            retry_base_ms: default_retry_base_ms(),
            send_timeout_seconds: default_send_timeout(),
            prune_unreachable: true,
            update_last_active: true,
        }
    }
}

fn default_wave_size() -> usize {
    25
}

fn default_wave_interval_ms() -> u64 {
    1000
}

fn default_max_sends() -> u32 {
    25
}

fn default_window_ms() -> u64 {
    1000
}

fn default_max_transient_retries() -> u32 {
    2
}

fn default_max_rate_limit_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    100
}

fn default_send_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
