use serde::Deserialize;
use vaultgate_telegram::config::DEFAULT_API_BASE_URL;

/// Configuration for the Telegram Bot API gateway.
///
/// # Example
///
/// ```toml
/// [telegram]
/// bot_username = "my_vault_bot"
/// storage_chat = "-1001234567890"
/// request_timeout_seconds = 20
/// ```
///
/// The bot token is best supplied through `VAULTGATE_BOT_TOKEN`.
#[derive(Deserialize)]
pub struct TelegramSection {
    /// Bot token issued by `@BotFather`.
    pub bot_token: Option<String>,
    /// Username used to render shareable links.
    pub bot_username: Option<String>,
    /// Chat that stored content is relocated into.
    pub storage_chat: Option<String>,
    /// Bot API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Upper bound on one Bot API call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Forbid recipients from forwarding delivered copies.
    #[serde(default)]
    pub protect_content: bool,
    /// Log platform calls instead of performing them.
    #[serde(default)]
    pub dry_run: bool,
}

impl std::fmt::Debug for TelegramSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSection")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("bot_username", &self.bot_username)
            .field("storage_chat", &self.storage_chat)
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("protect_content", &self.protect_content)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            bot_token: None,
            bot_username: None,
            storage_chat: None,
            api_base_url: default_api_base_url(),
            request_timeout_seconds: default_request_timeout(),
            protect_content: false,
            dry_run: false,
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_owned()
}

fn default_request_timeout() -> u64 {
    30
}
