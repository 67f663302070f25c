//! Conversation orchestrator with tool-use capability.
//!
//! One turn: ask the model with the catalog attached, run every requested
//! tool in request order, reinject the rendered results and ask again for
//! the final answer.

use serde_json::json;

use super::{AIError, ChatMessage, ChatModel, ChatRequest, ModelToolCall};
use crate::core::{EventLog, HostConfig, Memory, Role};
use crate::dispatch::{render, DispatchRouter, PendingCall, ToolCatalog, ToolSpec};
use crate::mcp::SessionManager;

/// Sampling settings for a turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnSettings {
    /// Temperature for the tool-selecting completion
    pub temperature: f32,
    /// Temperature for the follow-up completion
    pub follow_up_temperature: f32,
    /// Token limit per completion
    pub max_tokens: u32,
}

impl TurnSettings {
    /// Settings from the host configuration.
    pub fn from_host(host: &HostConfig) -> Self {
        Self {
            temperature: host.temperature,
            follow_up_temperature: host.follow_up_temperature,
            max_tokens: host.max_tokens,
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from_host(&HostConfig::default())
    }
}

/// One executed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    /// Model correlation id
    pub call_id: String,
    /// Tool name the model used
    pub tool: String,
    /// Server that received the call
    pub server: Option<String>,
    /// Whether the call failed
    pub is_error: bool,
    /// Rendered output, as shown and as sent to the model
    pub rendered: String,
}

/// Result of a conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Final answer text
    pub answer: String,
    /// Tools executed during the turn, in request order
    pub tool_runs: Vec<ToolRun>,
}

/// Drives conversational turns.
pub struct Orchestrator<M: ChatModel> {
    model: M,
    catalog: ToolCatalog,
    tool_specs: Vec<ToolSpec>,
    sessions: SessionManager,
    router: DispatchRouter,
    memory: Memory,
    event_log: Option<EventLog>,
    settings: TurnSettings,
}

impl<M: ChatModel> Orchestrator<M> {
    /// Create an orchestrator.
    pub fn new(
        model: M,
        catalog: ToolCatalog,
        sessions: SessionManager,
        router: DispatchRouter,
        settings: TurnSettings,
    ) -> Self {
        let tool_specs = catalog.as_model_schema();
        Self { model, catalog, tool_specs, sessions, router, memory: Memory::new(), event_log: None, settings }
    }

    /// Seed the memory with a system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.memory.add(Role::System, prompt);
        self
    }

    /// Attach an event log.
    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.event_log = Some(log);
        self
    }

    /// The tool catalog.
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// The live sessions.
    pub fn sessions_mut(&mut self) -> &mut SessionManager {
        &mut self.sessions
    }

    /// Conversation memory.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Record an event if a log is attached.
    pub fn log_event(&self, event: &str, fields: serde_json::Value) {
        if let Some(ref log) = self.event_log {
            log.log(event, fields);
        }
    }

    /// Dispatch one call, render it and log it.
    pub fn run_tool(&mut self, call: &PendingCall) -> ToolRun {
        let routed = self.router.dispatch(&self.catalog, &mut self.sessions, call);
        let rendered = render(&routed.result);

        tracing::info!(
            tool = %call.tool_name,
            server = routed.server.as_deref().unwrap_or("-"),
            is_error = routed.result.is_error,
            "Tool call finished"
        );
        self.log_event(
            "tools/call",
            json!({
                "name": call.tool_name,
                "remote": routed.tool,
                "server": routed.server,
                "is_error": routed.result.is_error,
            }),
        );

        ToolRun {
            call_id: call.id.clone(),
            tool: call.tool_name.clone(),
            server: routed.server,
            is_error: routed.result.is_error,
            rendered,
        }
    }

    /// Run one conversational turn.
    ///
    /// A model failure aborts the turn and leaves the memory untouched. Tool
    /// failures never do; they reach the model as error text.
    pub fn turn(&mut self, user: &str) -> Result<TurnOutcome, AIError> {
        let mut messages: Vec<ChatMessage> = self.memory.turns().iter().map(ChatMessage::from).collect();
        messages.push(ChatMessage::user(user));

        let reply = self.model.complete(&ChatRequest {
            messages: &messages,
            tools: Some(&self.tool_specs),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        })?;

        if reply.tool_calls.is_empty() {
            let answer = reply.content.unwrap_or_default();
            self.remember(user, &answer);
            self.log_event("chat", json!({"user": user, "assistant": answer}));
            return Ok(TurnOutcome { answer, tool_runs: Vec::new() });
        }

        let tool_runs: Vec<ToolRun> = reply.tool_calls.iter().map(|call| self.run_model_call(call)).collect();

        messages.push(ChatMessage::Assistant { content: reply.content, tool_calls: reply.tool_calls });
        messages.extend(
            tool_runs
                .iter()
                .map(|run| ChatMessage::Tool { tool_call_id: run.call_id.clone(), content: run.rendered.clone() }),
        );

        let follow = self.model.complete(&ChatRequest {
            messages: &messages,
            tools: None,
            temperature: self.settings.follow_up_temperature,
            max_tokens: self.settings.max_tokens,
        })?;

        let answer = follow.content.unwrap_or_default();
        self.remember(user, &answer);
        self.log_event(
            "chat+tools",
            json!({
                "user": user,
                "assistant": answer,
                "tools": tool_runs.iter().map(|r| r.tool.as_str()).collect::<Vec<_>>(),
            }),
        );

        Ok(TurnOutcome { answer, tool_runs })
    }

    fn run_model_call(&mut self, call: &ModelToolCall) -> ToolRun {
        let pending = PendingCall::from_raw(call.id.clone(), call.name.clone(), &call.arguments);
        self.run_tool(&pending)
    }

    fn remember(&mut self, user: &str, answer: &str) {
        self.memory.add(Role::User, user);
        self.memory.add(Role::Assistant, answer);
    }

    /// Close every session.
    pub fn shutdown(&mut self) {
        self.sessions.close_all();
    }
}
