//! Conversation memory.
//!
//! An append-only, ordered log of role/content turns. Each chat turn replays
//! a snapshot of it as the model's context window.

use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model
    System,
    /// Human input
    User,
    /// Model output
    Assistant,
    /// Rendered tool output
    Tool,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One remembered turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Author of the turn
    pub role: Role,
    /// Text content
    pub content: String,
    /// Tool call this turn answers (tool turns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Append-only conversation log.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    turns: Vec<ConversationTurn>,
}

impl Memory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn.
    pub fn add(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(ConversationTurn { role, content: content.into(), tool_call_id: None });
    }

    /// Borrow the turns.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether nothing has been remembered yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
