//! In-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use super::session::ProtocolSession;
use super::transport::{Transport, TransportError};

/// Everything a scripted transport was asked to send.
pub(crate) type SentLog = Arc<Mutex<Vec<Value>>>;

/// Answers requests from a queue and records what was sent.
///
/// Replies missing an `id` get the request's id filled in.
pub(crate) struct ScriptedTransport {
    pub replies: VecDeque<Result<Value, TransportError>>,
    pub sent: SentLog,
    pub alive: bool,
    pub die_on_error: bool,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: Vec<Result<Value, TransportError>>) -> Self {
        Self { replies: replies.into(), sent: Arc::new(Mutex::new(Vec::new())), alive: true, die_on_error: false }
    }
}

impl Transport for ScriptedTransport {
    fn round_trip(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.sent.lock().push(serde_json::to_value(request)?);
        match self.replies.pop_front() {
            Some(Ok(mut value)) => {
                if let Some(obj) = value.as_object_mut() {
                    if !obj.contains_key("id") {
                        obj.insert("id".to_string(), serde_json::to_value(&request.id)?);
                    }
                }
                Ok(serde_json::from_value(value)?)
            }
            Some(Err(e)) => {
                if self.die_on_error {
                    self.alive = false;
                }
                Err(e)
            }
            None => Err(TransportError::EmptyResponse),
        }
    }

    fn notify(&mut self, notification: &JsonRpcNotification) -> Result<(), TransportError> {
        self.sent.lock().push(serde_json::to_value(notification)?);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn close(&mut self) {
        self.alive = false;
    }

    fn kind(&self) -> &'static str {
        "scripted"
    }
}

/// A successful `initialize` reply.
pub(crate) fn init_ok() -> Result<Value, TransportError> {
    Ok(json!({"jsonrpc": "2.0", "result": {"protocolVersion": "2024-11-05", "serverInfo": {"name": "fake"}}}))
}

/// A `{"result": ...}` reply.
pub(crate) fn reply(result: Value) -> Result<Value, TransportError> {
    Ok(json!({"jsonrpc": "2.0", "result": result}))
}

/// A ready session whose post-handshake replies come from `replies`.
pub(crate) fn scripted_session(name: &str, replies: Vec<Result<Value, TransportError>>) -> (ProtocolSession, SentLog) {
    let mut all = vec![init_ok()];
    all.extend(replies);
    let transport = ScriptedTransport::new(all);
    let sent = Arc::clone(&transport.sent);
    match ProtocolSession::connect(name, Box::new(transport)) {
        Ok(session) => (session, sent),
        Err(e) => panic!("scripted handshake failed: {}", e),
    }
}
