//! Chat model integration.
//!
//! A [`ChatModel`] turns a message list (plus an optional tool catalog) into
//! either text or a list of tool calls. The [`Orchestrator`] drives one
//! conversational turn: ask the model, run the requested tools through the
//! dispatch router, feed the rendered results back and ask again.

mod agent;
mod openai;

pub use agent::{Orchestrator, ToolRun, TurnOutcome, TurnSettings};
pub use openai::OpenAIProvider;

use serde::{Deserialize, Serialize};

use crate::core::{ConversationTurn, Role};
use crate::dispatch::ToolSpec;

/// Trait for chat completion backends.
pub trait ChatModel {
    /// Run one completion.
    fn complete(&self, request: &ChatRequest<'_>) -> Result<ModelReply, AIError>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// One completion request.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    /// Conversation so far
    pub messages: &'a [ChatMessage],
    /// Tools the model may call (`None` disables tool use)
    pub tools: Option<&'a [ToolSpec]>,
    /// Sampling temperature
    pub temperature: f32,
    /// Token limit
    pub max_tokens: u32,
}

/// A message in the model conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    /// System message (instructions)
    System { content: String },

    /// User message
    User { content: String },

    /// Assistant message (may include tool calls)
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ModelToolCall>,
    },

    /// Rendered tool output
    Tool { tool_call_id: String, content: String },
}

impl ChatMessage {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    /// Role of the message.
    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        let content = turn.content.clone();
        match turn.role {
            Role::System => Self::System { content },
            Role::User => Self::User { content },
            Role::Assistant => Self::Assistant { content: Some(content), tool_calls: Vec::new() },
            Role::Tool => Self::Tool { tool_call_id: turn.tool_call_id.clone().unwrap_or_default(), content },
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelToolCall {
    /// Correlation id, echoed in the tool message
    pub id: String,
    /// Tool name
    pub name: String,
    /// Arguments as raw JSON text, exactly as the model produced them
    pub arguments: String,
}

/// What the model answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    /// Text content (if any)
    pub content: Option<String>,
    /// Tool calls requested (if any)
    pub tool_calls: Vec<ModelToolCall>,
}

impl ModelReply {
    /// A plain text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), tool_calls: Vec::new() }
    }
}

/// AI error types.
#[derive(Debug, thiserror::Error)]
pub enum AIError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No response from the model")]
    NoResponse,

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}
