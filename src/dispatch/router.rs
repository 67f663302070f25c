//! Dispatch router.
//!
//! Maps a model-issued tool call to exactly one session call, or to a
//! locally built error result. Dispatch never fails: every problem becomes
//! an error-shaped [`ToolResult`] so the remaining calls of a turn still run.

use serde_json::{Map, Value};

use super::catalog::{ToolCatalog, ToolRoute};
use super::result::ToolResult;
use super::wrappers::{self, WorkspaceRoots};
use crate::mcp::{SessionManager, SessionState};

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
    /// Correlation id from the model
    pub id: String,
    /// Tool name
    pub tool_name: String,
    /// Arguments (always an object)
    pub arguments: Map<String, Value>,
}

impl PendingCall {
    /// Create a call with decoded arguments.
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self { id: id.into(), tool_name: tool_name.into(), arguments }
    }

    /// Create a call from the model's raw argument text.
    ///
    /// Text that is not valid JSON, or not a JSON object, becomes `{}`.
    pub fn from_raw(id: impl Into<String>, tool_name: impl Into<String>, raw: &str) -> Self {
        let tool_name = tool_name.into();
        let arguments = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) if raw.trim().is_empty() => Map::new(),
            Ok(other) => {
                tracing::warn!(tool = %tool_name, kind = json_kind(&other), "Tool arguments are not an object");
                Map::new()
            }
            Err(e) => {
                tracing::warn!(tool = %tool_name, error = %e, "Tool arguments are not valid JSON");
                Map::new()
            }
        };
        Self { id: id.into(), tool_name, arguments }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A dispatched call and where it went.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedResult {
    /// Tool name the server saw (the model-facing name when nothing was sent)
    pub tool: String,
    /// Server the call was sent to, if one was resolved
    pub server: Option<String>,
    /// Outcome
    pub result: ToolResult,
}

/// Routes tool calls to sessions.
#[derive(Debug, Clone)]
pub struct DispatchRouter {
    roots: WorkspaceRoots,
}

impl DispatchRouter {
    /// Create a router resolving wrapper paths against `roots`.
    pub fn new(roots: WorkspaceRoots) -> Self {
        Self { roots }
    }

    /// Wrapper roots.
    pub fn roots(&self) -> &WorkspaceRoots {
        &self.roots
    }

    /// Run one call.
    pub fn dispatch(&self, catalog: &ToolCatalog, sessions: &mut SessionManager, call: &PendingCall) -> RoutedResult {
        let name = call.tool_name.as_str();

        let Some(descriptor) = catalog.resolve(name) else {
            return local_error(name, None, format!("Tool '{}' is not supported by this host.", name));
        };

        match &descriptor.route {
            ToolRoute::Passthrough => self.dispatch_passthrough(sessions, call),
            ToolRoute::Wrapper { kind, server } => match wrappers::transform(*kind, &self.roots, &call.arguments) {
                Ok(arguments) => forward(sessions, server, kind.remote_name(), arguments),
                Err(e) => local_error(kind.remote_name(), Some(server), format!("{}: {}", name, e)),
            },
            ToolRoute::Remote { server } => forward(sessions, server, name, call.arguments.clone()),
            ToolRoute::Local { server, method } => forward(sessions, server, method, call.arguments.clone()),
        }
    }

    fn dispatch_passthrough(&self, sessions: &mut SessionManager, call: &PendingCall) -> RoutedResult {
        let field = |key: &str| {
            call.arguments.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
        };

        let Some(server) = field("server") else {
            return local_error(&call.tool_name, None, "mcp_run requires a 'server' argument.");
        };
        let Some(tool) = field("name") else {
            return local_error(&call.tool_name, Some(server), "mcp_run requires a 'name' argument.");
        };

        let arguments = match call.arguments.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };

        forward(sessions, server, tool, arguments)
    }
}

fn forward(sessions: &mut SessionManager, server: &str, tool: &str, arguments: Map<String, Value>) -> RoutedResult {
    let result = match sessions.get_mut(server) {
        None => ToolResult::failure(format!("Server '{}' is not connected.", server)),
        Some(session) if session.state() != SessionState::Ready => {
            let state = if session.state() == SessionState::Broken { "broken" } else { "closed" };
            ToolResult::failure(format!("Server '{}' is unavailable (session {}).", server, state))
        }
        Some(session) => match session.call_tool(tool, arguments) {
            Ok(response) => ToolResult::from_response(response),
            Err(e) => {
                tracing::warn!(server = %server, tool = %tool, error = %e, "Tool call failed");
                ToolResult::failure(format!("Tool call to '{}' on server '{}' failed: {}", tool, server, e))
            }
        },
    };

    RoutedResult { tool: tool.to_string(), server: Some(server.to_string()), result }
}

fn local_error(tool: &str, server: Option<&str>, message: impl Into<String>) -> RoutedResult {
    RoutedResult { tool: tool.to_string(), server: server.map(str::to_string), result: ToolResult::failure(message) }
}
