use serde::{Deserialize, Serialize};

/// A chat reference as accepted by the Bot API: numeric id or `@username`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatRef {
    Id(i64),
    Username(String),
}

impl From<&str> for ChatRef {
    fn from(s: &str) -> Self {
        s.parse().map_or_else(|_| Self::Username(s.to_owned()), Self::Id)
    }
}

#[derive(Debug, Serialize)]
pub struct CopyMessageRequest {
    pub chat_id: ChatRef,
    pub from_chat_id: ChatRef,
    pub message_id: i64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub protect_content: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_notification: bool,
}

#[derive(Debug, Serialize)]
pub struct ForwardMessageRequest {
    pub chat_id: ChatRef,
    pub from_chat_id: ChatRef,
    pub message_id: i64,
}

#[derive(Debug, Serialize)]
pub struct DeleteMessageRequest {
    pub chat_id: ChatRef,
    pub message_id: i64,
}

/// Envelope every Bot API response is wrapped in.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<u16>,
    pub description: Option<String>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

/// Result of `copyMessage`.
#[derive(Debug, Deserialize)]
pub struct MessageId {
    pub message_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// The subset of a `Message` we need (result of `forwardMessage`).
#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
}

/// Result of `getMe`.
#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_ref_serializes_numbers_and_usernames() {
        assert_eq!(
            serde_json::to_value(ChatRef::from("-1001234")).unwrap(),
            serde_json::json!(-1_001_234)
        );
        assert_eq!(
            serde_json::to_value(ChatRef::from("@vault_store")).unwrap(),
            serde_json::json!("@vault_store")
        );
    }

    #[test]
    fn copy_request_omits_false_flags() {
        let req = CopyMessageRequest {
            chat_id: ChatRef::Id(1),
            from_chat_id: ChatRef::Id(2),
            message_id: 3,
            protect_content: false,
            disable_notification: true,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("protect_content").is_none());
        assert_eq!(json["disable_notification"], true);
    }

    #[test]
    fn error_envelope_parses_retry_after() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#;
        let resp: ApiResponse<MessageId> = serde_json::from_str(body).unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.error_code, Some(429));
        assert_eq!(resp.parameters.and_then(|p| p.retry_after), Some(7));
    }
}
