//! Wire shapes shared by the forwarder and its clients.
//!
//! Local shapes (`ChatRequest`, `ChatReply`) are what front ends speak to the
//! forwarder; backend shapes (`BackendChatRequest`, `BackendChatResponse`) are
//! what the forwarder speaks to the scheduling backend.

use serde::{Deserialize, Serialize};

/// Generic message used when nothing more specific is available.
pub const SEND_FAILED: &str = "Failed to send message";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Optional on the wire so the forwarder can accept loose input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            message: Some(message.into()),
            session_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl From<ChatRequest> for BackendChatRequest {
    fn from(req: ChatRequest) -> Self {
        Self {
            prompt: req.message,
            session_id: req.session_id.filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendChatResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    pub neura_z_response: String,
}

impl From<BackendChatResponse> for ChatReply {
    fn from(resp: BackendChatResponse) -> Self {
        Self {
            session_id: resp.session_id,
            response: resp.neura_z_response,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl AvailabilityQuery {
    /// Empty parameters are treated as absent.
    pub fn normalized(self) -> Self {
        Self {
            start: self.start.filter(|s| !s.is_empty()),
            end: self.end.filter(|s| !s.is_empty()),
        }
    }
}

/// Flat failure body returned by every forwarder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            timestamp: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Most specific description: `details`, then `error`, then the generic text.
    pub fn describe(&self) -> &str {
        self.details
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(Some(self.error.as_str()).filter(|e| !e.is_empty()))
            .unwrap_or(SEND_FAILED)
    }
}
