//! Shared fixtures: a scripted stdio MCP server and a tiny HTTP stub.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::Value;
use toolrelay::core::{Connection, HttpParams, ServerDescriptor, StdioParams};

/// Shell script speaking line-delimited JSON-RPC.
///
/// Answers `initialize`, lists two tools and answers `tools/call` with a
/// two-row structured result. Notifications (no `id`) are ignored.
pub const FAKE_STDIO_SERVER: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/^{"jsonrpc":"2.0","id":"\([^"]*\)".*/\1/p')
  [ -z "$id" ] && continue
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fake-sql","version":"0.1"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{"tools":[{"name":"list_tables","description":"List tables","inputSchema":{"type":"object","properties":{}}},{"name":"run_query","description":"Run a read-only query","inputSchema":{"type":"object","properties":{"sql":{"type":"string"}},"required":["sql"]}}]}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":"%s","result":{"content":[{"type":"text","text":"2 rows"}],"structuredContent":{"result":[{"a":1,"b":2},{"a":3,"b":4}]},"isError":false}}\n' "$id" ;;
    *)
      printf '{"jsonrpc":"2.0","id":"%s","error":{"code":-32601,"message":"Method not found"}}\n' "$id" ;;
  esac
done
"#;

/// Stdio server descriptor running a shell script.
pub fn sh_server(name: &str, script: &str, catalog_provider: bool) -> ServerDescriptor {
    ServerDescriptor {
        name: name.to_string(),
        connection: Connection::Stdio(StdioParams {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            cwd: None,
            env: Default::default(),
        }),
        catalog_provider,
    }
}

/// HTTP server descriptor pointing at a stub.
pub fn http_server(name: &str, base_url: &str, catalog_provider: bool) -> ServerDescriptor {
    ServerDescriptor {
        name: name.to_string(),
        connection: Connection::Http(HttpParams {
            base_url: base_url.to_string(),
            endpoint_path: "/mcp".to_string(),
            timeout_seconds: 5,
        }),
        catalog_provider,
    }
}

/// Canned HTTP reply.
pub struct StubReply {
    pub status: u16,
    pub body: String,
}

impl StubReply {
    pub fn json(status: u16, body: Value) -> Self {
        Self { status, body: body.to_string() }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self { status, body: body.to_string() }
    }

    pub fn no_content() -> Self {
        Self { status: 204, body: String::new() }
    }
}

/// Single-threaded HTTP stub. Every request body is recorded and answered by
/// the handler.
pub struct HttpStub {
    pub base_url: String,
    pub received: Arc<Mutex<Vec<Value>>>,
}

impl HttpStub {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&Value) -> StubReply + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let body = read_request(&stream);
                log.lock().unwrap().push(body.clone());
                let reply = handler(&body);
                write_reply(stream, &reply);
            }
        });

        Self { base_url, received }
    }

    pub fn methods(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|body| body["method"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

/// Reply to the MCP handshake and echo the request id.
pub fn handshake_reply(body: &Value) -> Option<StubReply> {
    match body["method"].as_str() {
        Some("initialize") => Some(StubReply::json(
            200,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": {"protocolVersion": "2024-11-05", "capabilities": {}, "serverInfo": {"name": "stub", "version": "1"}}
            }),
        )),
        Some("notifications/initialized") => Some(StubReply::no_content()),
        _ => None,
    }
}

fn read_request(stream: &TcpStream) -> Value {
    let mut reader = BufReader::new(stream);
    let mut content_length = 0usize;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

fn write_reply(mut stream: TcpStream, reply: &StubReply) {
    let reason = match reply.status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let head = if reply.status == 204 {
        format!("HTTP/1.1 204 {}\r\nConnection: close\r\n\r\n", reason)
    } else {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            reply.status,
            reason,
            reply.body.len()
        )
    };
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(reply.body.as_bytes());
    let _ = stream.flush();
}
