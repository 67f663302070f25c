//! Core types for toolrelay.
//!
//! Configuration, conversation memory and the JSONL event log shared by the
//! chat loop and the one-shot commands.

mod config;
mod event_log;
mod memory;

pub use config::{
    Config, ConfigError, ConfigIssue, Connection, HostConfig, HttpParams, ServerDescriptor,
    StdioParams, DEFAULT_SYSTEM_PROMPT,
};
pub use event_log::EventLog;
pub use memory::{ConversationTurn, Memory, Role};
