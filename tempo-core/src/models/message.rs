use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Opaque message identifier. Ids minted by an [`IdSequence`] are decimal
/// millisecond stamps; ids restored from storage are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One entry of the conversation log. Persisted as
/// `{"id", "type", "content", "timestamp"}` with an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(rename = "type")]
    pub role: Role,
    pub content: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(id: MessageId, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            created_at,
        }
    }

    pub fn assistant(id: MessageId, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            created_at,
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Strictly increasing id source based on wall-clock milliseconds.
#[derive(Debug, Default, Clone)]
pub struct IdSequence {
    last: i64,
}

impl IdSequence {
    pub fn next(&mut self, now: DateTime<Utc>) -> MessageId {
        self.last = now.timestamp_millis().max(self.last + 1);
        MessageId(self.last.to_string())
    }

    /// Move past every numeric id in `messages` so new ids sort after restored ones.
    pub fn seed_from(&mut self, messages: &[Message]) {
        let highest = messages
            .iter()
            .filter_map(|m| m.id.as_str().parse::<i64>().ok())
            .max();
        if let Some(h) = highest {
            self.last = self.last.max(h);
        }
    }
}
