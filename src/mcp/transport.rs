//! Transport channels for MCP sessions.
//!
//! A channel carries JSON-RPC envelopes and knows nothing about the protocol
//! above it. Requests go through [`Transport::round_trip`], which writes one
//! request and waits for its reply; there is no standalone send or receive,
//! so a caller cannot interleave two requests on one channel.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::core::{Connection, HttpParams, ServerDescriptor, StdioParams};

/// Most stderr kept for diagnostics.
const STDERR_LIMIT: usize = 64 * 1024;

/// Longest HTTP error body echoed into an error message.
const BODY_PREVIEW_LIMIT: usize = 512;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No response from server (stream closed){}", stderr_suffix(.stderr))]
    StreamClosed { stderr: String },

    #[error("Invalid JSON from server: {0}")]
    InvalidJson(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Server returned an empty response")]
    EmptyResponse,

    #[error("Channel is closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!("\nSTDERR:\n{}", stderr.trim_end())
    }
}

/// A bidirectional channel to one MCP server.
pub trait Transport: Send {
    /// Send one request and wait for its response.
    fn round_trip(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Send a notification; no reply is read.
    fn notify(&mut self, notification: &JsonRpcNotification) -> Result<(), TransportError>;

    /// Whether the channel can still carry traffic in order.
    fn is_alive(&self) -> bool;

    /// Tear the channel down. Safe to call repeatedly.
    fn close(&mut self);

    /// Short label for display (`stdio`, `http`).
    fn kind(&self) -> &'static str;
}

/// Open the channel described by a server entry.
pub fn open(descriptor: &ServerDescriptor) -> Result<Box<dyn Transport>, TransportError> {
    match &descriptor.connection {
        Connection::Stdio(params) => Ok(Box::new(StdioTransport::spawn(&descriptor.name, params)?)),
        Connection::Http(params) => Ok(Box::new(HttpTransport::new(&descriptor.name, params)?)),
    }
}

// ============================================================================
// stdio
// ============================================================================

/// Child process speaking line-delimited JSON on stdin/stdout.
pub struct StdioTransport {
    /// Server name (for logs)
    server: String,
    /// Server process
    process: Option<Child>,
    /// Stdin handle
    stdin: Option<ChildStdin>,
    /// Stdout reader
    stdout: Option<BufReader<ChildStdout>>,
    /// Tail of everything the child wrote to stderr
    stderr: Arc<Mutex<String>>,
    /// Thread draining stderr
    stderr_reader: Option<JoinHandle<()>>,
    /// Cleared after any failure that may have desynchronized the stream
    alive: bool,
}

impl StdioTransport {
    /// Spawn the server process.
    pub fn spawn(server: &str, params: &StdioParams) -> Result<Self, TransportError> {
        let mut cmd = Command::new(&params.command);
        cmd.args(&params.args);

        for (key, value) in &params.env {
            // Expand environment variables in the value
            let expanded = shellexpand::env(value).unwrap_or_else(|_| value.clone().into());
            cmd.env(key, expanded.as_ref());
        }

        if let Some(ref cwd) = params.cwd {
            cmd.current_dir(cwd);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|source| TransportError::Spawn { command: params.command.clone(), source })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(BufReader::new);
        let stderr = Arc::new(Mutex::new(String::new()));

        let stderr_reader = child.stderr.take().map(|pipe| {
            let buffer = Arc::clone(&stderr);
            std::thread::spawn(move || drain_stderr(pipe, &buffer))
        });

        tracing::debug!(server = %server, command = %params.command, "Spawned stdio server");

        Ok(Self {
            server: server.to_string(),
            process: Some(child),
            stdin,
            stdout,
            stderr,
            stderr_reader,
            alive: true,
        })
    }

    /// Write one JSON line and flush it.
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::Closed)?;
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        stdin.write_all(buf.as_bytes())?;
        stdin.flush()?;
        Ok(())
    }

    /// Read the next response line, skipping blank lines and server
    /// notifications.
    fn read_response(&mut self) -> Result<JsonRpcResponse, TransportError> {
        loop {
            let stdout = self.stdout.as_mut().ok_or(TransportError::Closed)?;
            let mut line = String::new();
            if stdout.read_line(&mut line)? == 0 {
                return Err(TransportError::StreamClosed { stderr: self.collect_stderr() });
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            tracing::debug!("MCP {} -> {}", self.server, trimmed);

            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| TransportError::InvalidJson(format!("{}: {}", e, preview(trimmed))))?;

            if value.get("id").is_none() && value.get("method").is_some() {
                tracing::debug!(server = %self.server, "Skipping server notification");
                continue;
            }

            return serde_json::from_value(value)
                .map_err(|e| TransportError::InvalidJson(e.to_string()));
        }
    }

    /// Wait briefly for the stderr reader, then return what it captured.
    fn collect_stderr(&mut self) -> String {
        if let Some(handle) = self.stderr_reader.take() {
            for _ in 0..20 {
                if handle.is_finished() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                self.stderr_reader = Some(handle);
            }
        }
        self.stderr.lock().clone()
    }

    fn exchange(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let line = serde_json::to_string(request)?;
        tracing::debug!("MCP {} <- {}", self.server, line);
        self.write_line(&line)?;

        let response = self.read_response()?;
        if response.id.as_ref() != Some(&request.id) {
            tracing::warn!(
                server = %self.server,
                expected = %request.id,
                got = ?response.id,
                "Response id does not match request id"
            );
        }
        Ok(response)
    }
}

fn drain_stderr(pipe: std::process::ChildStderr, buffer: &Mutex<String>) {
    let reader = BufReader::new(pipe);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        let mut buf = buffer.lock();
        buf.push_str(&line);
        buf.push('\n');
        if buf.len() > STDERR_LIMIT {
            let mut cut = buf.len() - STDERR_LIMIT;
            while !buf.is_char_boundary(cut) {
                cut += 1;
            }
            buf.drain(..cut);
        }
    }
}

impl Transport for StdioTransport {
    fn round_trip(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        if !self.alive {
            return Err(TransportError::Closed);
        }
        let result = self.exchange(request);
        if result.is_err() {
            self.alive = false;
        }
        result
    }

    fn notify(&mut self, notification: &JsonRpcNotification) -> Result<(), TransportError> {
        if !self.alive {
            return Err(TransportError::Closed);
        }
        let line = serde_json::to_string(notification)?;
        tracing::debug!("MCP {} <- {}", self.server, line);
        let result = self.write_line(&line);
        if result.is_err() {
            self.alive = false;
        }
        result
    }

    fn is_alive(&self) -> bool {
        self.alive && self.process.is_some()
    }

    fn close(&mut self) {
        self.alive = false;
        // Dropping stdin first lets well-behaved servers exit on EOF.
        self.stdin = None;
        self.stdout = None;
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
            tracing::debug!(server = %self.server, "Stopped stdio server");
        }
    }

    fn kind(&self) -> &'static str {
        "stdio"
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// http
// ============================================================================

/// Stateless HTTP endpoint receiving one JSON body per message.
pub struct HttpTransport {
    /// Server name (for logs)
    server: String,
    /// Full endpoint URL
    endpoint: String,
    /// HTTP client
    client: reqwest::blocking::Client,
    /// Set by `close`
    closed: bool,
}

impl HttpTransport {
    /// Create a transport for an endpoint.
    pub fn new(server: &str, params: &HttpParams) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(params.timeout_seconds))
            .user_agent(format!("{}/{}", crate::APP_NAME, env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { server: server.to_string(), endpoint: params.endpoint(), client, closed: false })
    }

    /// Endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST a message; `Ok(None)` means an empty acknowledgement.
    fn post<B: serde::Serialize>(&self, body: &B) -> Result<Option<Value>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let response = self.client.post(&self.endpoint).json(body).send()?;
        let status = response.status();

        if status == reqwest::StatusCode::NO_CONTENT {
            tracing::debug!("MCP {} -> 204 No Content", self.server);
            return Ok(None);
        }

        let text = response.text()?;
        tracing::debug!("MCP {} -> {} {}", self.server, status.as_u16(), text.trim());

        if !status.is_success() {
            // JSON-RPC error envelopes still carry a protocol answer.
            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                if value.get("jsonrpc").is_some() && value.get("error").is_some() {
                    return Ok(Some(value));
                }
            }
            return Err(TransportError::Status { status: status.as_u16(), body: preview(&text) });
        }

        if text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| TransportError::InvalidJson(format!("{}: {}", e, preview(&text))))
    }
}

impl Transport for HttpTransport {
    fn round_trip(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::debug!("MCP {} <- {}", self.server, request.method);
        let value = self.post(request)?.ok_or(TransportError::EmptyResponse)?;
        serde_json::from_value(value).map_err(|e| TransportError::InvalidJson(e.to_string()))
    }

    fn notify(&mut self, notification: &JsonRpcNotification) -> Result<(), TransportError> {
        tracing::debug!("MCP {} <- {}", self.server, notification.method);
        self.post(notification).map(|_| ())
    }

    fn is_alive(&self) -> bool {
        !self.closed
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= BODY_PREVIEW_LIMIT {
        return trimmed.to_string();
    }
    let mut end = BODY_PREVIEW_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
