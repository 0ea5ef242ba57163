//! Wire types for the downstream (Anthropic Messages) protocol.
//!
//! Deserialization is deliberately lenient: missing fields take their
//! documented defaults and unrecognized shapes degrade instead of failing,
//! so a sloppy client still gets a best-effort translation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesRequest {
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        }
    }
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// Message content: a plain string, a list of typed blocks, or anything
/// else (which contributes no text).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Other(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// Concatenate the text of every `text` block; other block types are
    /// dropped. Plain strings pass through unchanged.
    pub fn flatten(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::Unsupported => None,
                })
                .collect(),
            MessageContent::Other(_) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Unsupported,
}

/// `msg_` + 24 hex chars, unique per response.
pub fn new_message_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("msg_{}", &hex[..24])
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub role: &'static str,
    pub content: Vec<TextBlock>,
    pub model: String,
    pub stop_reason: StopReason,
    pub stop_sequence: Option<String>,
    pub usage: MessagesUsage,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            kind: "text",
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MessagesUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The four frame shapes a streamed response is built from.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart { message: StartMessage },
    ContentBlockDelta { index: u32, delta: TextDelta },
    MessageStop { message: StopMessage },
    Error { error: StreamError },
}

#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub role: &'static str,
    pub model: String,
    pub content: Vec<TextBlock>,
    pub stop_reason: Option<StopReason>,
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextDelta {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopMessage {
    pub id: String,
    pub stop_reason: StopReason,
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl StreamEvent {
    pub fn message_start(id: impl Into<String>, model: impl Into<String>) -> Self {
        StreamEvent::MessageStart {
            message: StartMessage {
                id: id.into(),
                kind: "message",
                role: "assistant",
                model: model.into(),
                content: vec![TextBlock::new("")],
                stop_reason: None,
                stop_sequence: None,
            },
        }
    }

    pub fn text_delta(text: impl Into<String>) -> Self {
        StreamEvent::ContentBlockDelta {
            index: 0,
            delta: TextDelta {
                kind: "text_delta",
                text: text.into(),
            },
        }
    }

    pub fn message_stop(id: impl Into<String>) -> Self {
        StreamEvent::MessageStop {
            message: StopMessage {
                id: id.into(),
                stop_reason: StopReason::EndTurn,
                stop_sequence: None,
            },
        }
    }

    pub fn error(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: StreamError {
                error_type: error_type.into(),
                message: message.into(),
            },
        }
    }
}
