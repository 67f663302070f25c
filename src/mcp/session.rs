//! MCP protocol session.
//!
//! Wraps one transport, performs the `initialize` handshake and exposes the
//! two tool operations the host needs.

use serde_json::{json, Value};

use super::protocol::{
    methods, CallToolParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse,
};
use super::transport::{Transport, TransportError};

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake done, requests allowed
    Ready,
    /// The channel failed; ordering can no longer be trusted
    Broken,
    /// Closed by the host
    Closed,
}

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Handshake rejected: {0}")]
    Rejected(JsonRpcError),

    #[error("Session is {0}")]
    Unavailable(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A handshaken connection to one MCP server.
pub struct ProtocolSession {
    /// Server name
    server: String,
    /// Owned channel
    transport: Box<dyn Transport>,
    /// Current state
    state: SessionState,
    /// Handshake payload
    server_info: Option<InitializeResult>,
}

impl ProtocolSession {
    /// Perform the handshake over `transport`.
    ///
    /// On failure the transport is closed and no session is returned.
    pub fn connect(server: impl Into<String>, mut transport: Box<dyn Transport>) -> Result<Self, SessionError> {
        let server = server.into();
        match handshake(transport.as_mut()) {
            Ok(info) => {
                tracing::info!(
                    server = %server,
                    transport = transport.kind(),
                    remote = info.server_info.as_ref().map(|s| s.name.as_str()).unwrap_or("?"),
                    "MCP session ready"
                );
                Ok(Self { server, transport, state: SessionState::Ready, server_info: Some(info) })
            }
            Err(e) => {
                transport.close();
                Err(e)
            }
        }
    }

    /// Server name.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether requests can be sent.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Transport label.
    pub fn transport_kind(&self) -> &'static str {
        self.transport.kind()
    }

    /// What the server reported during the handshake.
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    /// Send `tools/list` and return the raw response envelope.
    pub fn list_tools(&mut self) -> Result<JsonRpcResponse, SessionError> {
        self.request(methods::TOOLS_LIST, json!({}))
    }

    /// Send `tools/call` and return the raw response envelope.
    pub fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Map<String, Value>,
    ) -> Result<JsonRpcResponse, SessionError> {
        let params = serde_json::to_value(CallToolParams { name: name.to_string(), arguments })?;
        self.request(methods::TOOLS_CALL, params)
    }

    fn request(&mut self, method: &str, params: Value) -> Result<JsonRpcResponse, SessionError> {
        match self.state {
            SessionState::Ready => {}
            SessionState::Broken => return Err(SessionError::Unavailable("broken")),
            SessionState::Closed => return Err(SessionError::Unavailable("closed")),
        }

        let request = JsonRpcRequest::new(method, Some(params));
        match self.transport.round_trip(&request) {
            Ok(response) => Ok(response),
            Err(e) => {
                if !self.transport.is_alive() {
                    tracing::warn!(server = %self.server, error = %e, "MCP session broken");
                    self.state = SessionState::Broken;
                }
                Err(e.into())
            }
        }
    }

    /// Close the session. Idempotent.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.transport.close();
            self.state = SessionState::Closed;
            tracing::debug!(server = %self.server, "MCP session closed");
        }
    }
}

impl Drop for ProtocolSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn handshake(transport: &mut dyn Transport) -> Result<InitializeResult, SessionError> {
    let params = serde_json::to_value(InitializeParams::default())?;
    let request = JsonRpcRequest::new(methods::INITIALIZE, Some(params));

    let response = transport.round_trip(&request)?;
    if let Some(error) = response.error {
        return Err(SessionError::Rejected(error));
    }

    // Servers that answer with a bare `{}` are accepted.
    let info = response.result.and_then(|result| serde_json::from_value(result).ok()).unwrap_or_default();

    transport.notify(&JsonRpcNotification::new(methods::INITIALIZED, Some(json!({}))))?;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::mcp::testing::{init_ok, ScriptedTransport};

    #[test]
    fn test_handshake_sends_initialize_then_initialized() {
        let transport = ScriptedTransport::new(vec![init_ok()]);
        let sent = Arc::clone(&transport.sent);

        let session = ProtocolSession::connect("fake", Box::new(transport)).unwrap();
        assert!(session.is_ready());
        assert_eq!(session.server_info().unwrap().server_info.as_ref().unwrap().name, "fake");

        let sent = sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["method"], "initialize");
        assert_eq!(sent[0]["params"]["protocolVersion"], "2024-11-05");
        assert_eq!(sent[1]["method"], "notifications/initialized");
        assert_eq!(sent[1]["params"], json!({}));
        assert!(sent[1].get("id").is_none());
    }

    #[test]
    fn test_handshake_rejected() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "jsonrpc": "2.0", "error": {"code": -32600, "message": "unsupported version"}
        }))]);
        let err = ProtocolSession::connect("fake", Box::new(transport)).err().unwrap();
        assert!(matches!(err, SessionError::Rejected(_)));
        assert!(err.to_string().contains("unsupported version"));
    }

    #[test]
    fn test_handshake_transport_failure() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::StreamClosed {
            stderr: "ModuleNotFoundError".to_string(),
        })]);
        let err = ProtocolSession::connect("fake", Box::new(transport)).err().unwrap();
        assert!(err.to_string().contains("ModuleNotFoundError"));
    }

    #[test]
    fn test_call_tool_params_and_fresh_ids() {
        let transport = ScriptedTransport::new(vec![
            init_ok(),
            Ok(json!({"jsonrpc": "2.0", "result": {"tools": []}})),
            Ok(json!({"jsonrpc": "2.0", "result": {"content": []}})),
        ]);
        let sent = Arc::clone(&transport.sent);
        let mut session = ProtocolSession::connect("fake", Box::new(transport)).unwrap();

        session.list_tools().unwrap();
        let mut args = serde_json::Map::new();
        args.insert("query".to_string(), json!("SELECT 1"));
        session.call_tool("sql.explain", args).unwrap();

        let sent = sent.lock();
        assert_eq!(sent[2]["method"], "tools/list");
        assert_eq!(sent[2]["params"], json!({}));
        assert_eq!(sent[3]["method"], "tools/call");
        assert_eq!(sent[3]["params"], json!({"name": "sql.explain", "arguments": {"query": "SELECT 1"}}));
        assert_ne!(sent[2]["id"], sent[3]["id"]);
    }

    #[test]
    fn test_dead_channel_breaks_session() {
        let mut transport = ScriptedTransport::new(vec![init_ok(), Err(TransportError::Closed)]);
        transport.die_on_error = true;
        let mut session = ProtocolSession::connect("fake", Box::new(transport)).unwrap();

        assert!(session.list_tools().is_err());
        assert_eq!(session.state(), SessionState::Broken);
        assert!(matches!(session.list_tools(), Err(SessionError::Unavailable("broken"))));
    }

    #[test]
    fn test_live_channel_failure_keeps_session() {
        let transport = ScriptedTransport::new(vec![
            init_ok(),
            Err(TransportError::Status { status: 502, body: "bad gateway".to_string() }),
            Ok(json!({"jsonrpc": "2.0", "result": {"tools": []}})),
        ]);
        let mut session = ProtocolSession::connect("fake", Box::new(transport)).unwrap();

        assert!(session.list_tools().is_err());
        assert!(session.is_ready());
        assert!(session.list_tools().is_ok());
    }

    #[test]
    fn test_close_is_idempotent() {
        let transport = ScriptedTransport::new(vec![init_ok()]);
        let mut session = ProtocolSession::connect("fake", Box::new(transport)).unwrap();
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.list_tools(), Err(SessionError::Unavailable("closed"))));
    }
}
