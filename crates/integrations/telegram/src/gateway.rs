use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use vaultgate_core::{Location, SubjectId};
use vaultgate_provider::{DeliveryError, Gateway};

use crate::config::TelegramConfig;
use crate::error::TelegramError;
use crate::types::{
    ApiResponse, ChatRef, CopyMessageRequest, DeleteMessageRequest, ForwardMessageRequest,
    Message, MessageId, User,
};

/// Fallback pause when a 429 carries no `retry_after`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Delivery gateway backed by the Telegram Bot API.
pub struct TelegramGateway {
    config: TelegramConfig,
    client: Client,
}

impl TelegramGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: TelegramConfig) -> Result<Self, TelegramError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { config, client })
    }

    /// Create a new gateway with a custom HTTP client.
    pub fn with_client(config: TelegramConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Call a Bot API method and unwrap its `result`.
    async fn call<Req, Res>(&self, method: &str, request: &Req) -> Result<Res, TelegramError>
    where
        Req: Serialize + Sync,
        Res: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.config.method_url(method))
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        let Ok(envelope) = serde_json::from_str::<ApiResponse<Res>>(&body) else {
            // Proxies in front of the Bot API may answer with non-JSON bodies.
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(TelegramError::RateLimited(DEFAULT_RETRY_AFTER));
            }
            if !status.is_success() {
                return Err(TelegramError::Api {
                    code: status.as_u16(),
                    description: body,
                });
            }
            return Err(TelegramError::InvalidResponse(format!(
                "{method}: unparseable body"
            )));
        };

        if envelope.ok {
            return envelope
                .result
                .ok_or_else(|| TelegramError::InvalidResponse(format!("{method}: missing result")));
        }

        let code = envelope.error_code.unwrap_or_else(|| status.as_u16());
        let retry_after = envelope.parameters.and_then(|p| p.retry_after);
        if code == 429 || retry_after.is_some() {
            let pause = retry_after.map_or(DEFAULT_RETRY_AFTER, Duration::from_secs);
            debug!(method, retry_after_ms = pause.as_millis(), "Telegram asked to back off");
            return Err(TelegramError::RateLimited(pause));
        }

        Err(TelegramError::Api {
            code,
            description: envelope.description.unwrap_or_default(),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> TelegramError {
        if e.is_timeout() {
            TelegramError::Timeout(self.config.request_timeout)
        } else {
            TelegramError::Http(e)
        }
    }
}

impl Gateway for TelegramGateway {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "telegram"
    }

    #[instrument(skip(self), fields(gateway = "telegram", %source, %recipient))]
    async fn deliver(
        &self,
        source: &Location,
        recipient: &SubjectId,
    ) -> Result<Location, DeliveryError> {
        let request = CopyMessageRequest {
            chat_id: ChatRef::from(recipient.as_str()),
            from_chat_id: ChatRef::from(source.chat_id.as_str()),
            message_id: source.message_id,
            protect_content: self.config.protect_content,
            disable_notification: self.config.disable_notification,
        };
        let copied: MessageId = self.call("copyMessage", &request).await?;
        debug!(message_id = copied.message_id, "message copied");
        Ok(Location::new(recipient.as_str(), copied.message_id))
    }

    #[instrument(skip(self), fields(gateway = "telegram", %location))]
    async fn delete(&self, location: &Location) -> Result<(), DeliveryError> {
        let request = DeleteMessageRequest {
            chat_id: ChatRef::from(location.chat_id.as_str()),
            message_id: location.message_id,
        };
        let deleted: bool = self.call("deleteMessage", &request).await?;
        if !deleted {
            warn!("deleteMessage returned false");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(gateway = "telegram", %source))]
    async fn relocate(
        &self,
        source: &Location,
        destination_chat: &str,
    ) -> Result<Location, DeliveryError> {
        let request = ForwardMessageRequest {
            chat_id: ChatRef::from(destination_chat),
            from_chat_id: ChatRef::from(source.chat_id.as_str()),
            message_id: source.message_id,
        };
        let stored: Message = self.call("forwardMessage", &request).await?;
        Ok(Location::new(stored.chat.id.to_string(), stored.message_id))
    }

    #[instrument(skip(self), fields(gateway = "telegram"))]
    async fn health_check(&self) -> Result<(), DeliveryError> {
        let me: User = self.call("getMe", &serde_json::json!({})).await?;
        debug!(bot_id = me.id, username = ?me.username, "Telegram health check passed");
        Ok(())
    }
}
