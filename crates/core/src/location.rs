use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A message coordinate on the messaging platform.
///
/// Used both for stored source content (the physical location behind a
/// logical id) and for delivered copies in a recipient's chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Chat identifier (numeric id or `@username`).
    pub chat_id: String,
    /// Message identifier within the chat.
    pub message_id: i64,
}

impl Location {
    #[must_use]
    pub fn new(chat_id: impl Into<String>, message_id: i64) -> Self {
        Self {
            chat_id: chat_id.into(),
            message_id,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.message_id)
    }
}

impl FromStr for Location {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chat, message) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::Location(s.to_owned()))?;
        if chat.is_empty() {
            return Err(ParseError::Location(s.to_owned()));
        }
        let message_id = message
            .parse()
            .map_err(|_| ParseError::Location(s.to_owned()))?;
        Ok(Self::new(chat, message_id))
    }
}
