//! Start-payload codec for shareable deep links.
//!
//! A payload looks like `c_<logical id>` or `b_<batch id>`, optionally
//! followed by `_<token secret>`. Ids are 32 hex characters and secrets are
//! URL-safe base64, so the payload stays inside the `[A-Za-z0-9_-]` alphabet
//! and under the platform's 64 character limit.

use std::fmt;

use crate::error::ParseError;
use crate::types::{BatchId, LogicalId};

/// Maximum length of a start payload accepted by the platform.
pub const MAX_PAYLOAD_LEN: usize = 64;

const ID_LEN: usize = 32;

/// What a link points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Content(LogicalId),
    Batch(BatchId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLink {
    pub target: LinkTarget,
    pub token: Option<String>,
}

impl AccessLink {
    #[must_use]
    pub fn content(id: LogicalId) -> Self {
        Self {
            target: LinkTarget::Content(id),
            token: None,
        }
    }

    #[must_use]
    pub fn batch(id: BatchId) -> Self {
        Self {
            target: LinkTarget::Batch(id),
            token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, secret: impl Into<String>) -> Self {
        self.token = Some(secret.into());
        self
    }

    #[must_use]
    pub fn to_payload(&self) -> String {
        let (tag, id) = match &self.target {
            LinkTarget::Content(id) => ('c', id.as_str()),
            LinkTarget::Batch(id) => ('b', id.as_str()),
        };
        match &self.token {
            Some(token) => format!("{tag}_{id}_{token}"),
            None => format!("{tag}_{id}"),
        }
    }

    /// Full `https://t.me/<bot>?start=<payload>` URL.
    #[must_use]
    pub fn url(&self, bot_username: &str) -> String {
        format!(
            "https://t.me/{}?start={}",
            bot_username.trim_start_matches('@'),
            self.to_payload()
        )
    }

    pub fn parse(payload: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::Link(payload.to_owned());

        if payload.len() > MAX_PAYLOAD_LEN
            || !payload
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(invalid());
        }

        let (tag, rest) = payload.split_once('_').ok_or_else(invalid)?;
        if rest.len() < ID_LEN || !rest.is_char_boundary(ID_LEN) {
            return Err(invalid());
        }
        let (id, tail) = rest.split_at(ID_LEN);
        if !id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let token = match tail {
            "" => None,
            t => match t.strip_prefix('_') {
                Some(secret) if !secret.is_empty() => Some(secret.to_owned()),
                _ => return Err(invalid()),
            },
        };

        let target = match tag {
            "c" => LinkTarget::Content(LogicalId::new(id)),
            "b" => LinkTarget::Batch(BatchId::new(id)),
            _ => return Err(invalid()),
        };

        Ok(Self { target, token })
    }
}

impl fmt::Display for AccessLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_payload())
    }
}
