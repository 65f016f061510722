use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SubjectId;

/// A registered member of the broadcast population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub subject: SubjectId,
    pub joined_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub banned: bool,
}

impl Recipient {
    #[must_use]
    pub fn new(subject: SubjectId, joined_at: DateTime<Utc>) -> Self {
        Self {
            subject,
            joined_at,
            last_active_at: None,
            banned: false,
        }
    }
}
