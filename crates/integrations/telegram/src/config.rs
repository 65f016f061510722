use std::time::Duration;

/// Default Bot API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Configuration for the Telegram gateway.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token issued by `@BotFather`.
    pub bot_token: String,

    /// Bot API base URL. Overridable for self-hosted Bot API servers and tests.
    pub api_base_url: String,

    /// Per-request timeout. One platform call never blocks longer than this.
    pub request_timeout: Duration,

    /// Forbid recipients from forwarding or saving delivered copies.
    pub protect_content: bool,

    /// Deliver silently.
    pub disable_notification: bool,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("protect_content", &self.protect_content)
            .field("disable_notification", &self.disable_notification)
            .finish()
    }
}

impl TelegramConfig {
    /// Create a new configuration with the given bot token.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            request_timeout: Duration::from_secs(30),
            protect_content: false,
            disable_notification: false,
        }
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_protect_content(mut self, protect: bool) -> Self {
        self.protect_content = protect;
        self
    }

    #[must_use]
    pub fn with_disable_notification(mut self, silent: bool) -> Self {
        self.disable_notification = silent;
        self
    }

    /// URL of a Bot API method.
    pub(crate) fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base_url.trim_end_matches('/'),
            self.bot_token
        )
    }
}
