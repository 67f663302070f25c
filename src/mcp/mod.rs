//! MCP (Model Context Protocol) client.
//!
//! Speaks JSON-RPC 2.0 to tool servers over two kinds of channel: a child
//! process on stdio, or a stateless HTTP endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 SessionManager                   │
//! │  • Connects configured servers                  │
//! │  • Records failures, aborts on required ones    │
//! │  • Closes every session on drop                 │
//! └─────────────────────────────────────────────────┘
//!                        │
//!        ┌───────────────┼───────────────┐
//!        ▼               ▼               ▼
//!  ProtocolSession ProtocolSession ProtocolSession
//!        │               │               │
//!  StdioTransport  StdioTransport  HttpTransport
//!  (SQLScout)      (FS)            (SupabaseAdmin)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use toolrelay::core::Config;
//! use toolrelay::mcp::SessionManager;
//!
//! let config = Config::load(None)?.with_process_env();
//! let mut sessions = SessionManager::new();
//! let failures = sessions.connect_all(&config)?;
//!
//! if let Some(session) = sessions.get_mut("SQLScout") {
//!     let listing = session.list_tools()?;
//! }
//! ```

mod manager;
mod protocol;
mod session;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use manager::{ManagerError, ServerFailure, SessionManager};
pub use protocol::{
    methods, CallToolParams, ClientInfo, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RemoteTool, RequestId, ServerInfo,
    PROTOCOL_VERSION,
};
pub use session::{ProtocolSession, SessionError, SessionState};
pub use transport::{open, HttpTransport, StdioTransport, Transport, TransportError};
