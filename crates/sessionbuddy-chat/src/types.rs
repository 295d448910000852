//! Request/response types shared with the HTTP layer.

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Incoming chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
}

impl ChatRequest {
    /// Validate a raw JSON body. `message` must be a non-blank string.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ChatError> {
        match value.get("message") {
            Some(serde_json::Value::String(message)) if !message.trim().is_empty() => Ok(Self {
                message: message.clone(),
            }),
            Some(serde_json::Value::String(_)) => {
                Err(ChatError::InvalidRequest("messageが空です".into()))
            }
            Some(_) => Err(ChatError::InvalidRequest(
                "messageは文字列で指定してください".into(),
            )),
            None => Err(ChatError::InvalidRequest("messageフィールドが必要です".into())),
        }
    }
}

/// Blocking chat response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// One outbound SSE frame: `data: {"delta": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaFrame {
    pub delta: String,
}

/// A parsed upstream stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental answer text, never empty.
    Delta(String),
    /// End of stream, either the sentinel or upstream closing the body.
    Done,
    /// Transport failure after streaming began. Always the last event.
    Error(String),
}
