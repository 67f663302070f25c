//! # toolrelay
//!
//! Chat host that lets a language model call tools exposed by MCP servers.
//!
//! The host speaks JSON-RPC 2.0 to each configured server, over a child
//! process's stdio or a plain HTTP endpoint, merges the servers' tools into
//! one catalog, routes every model tool call to the right server and renders
//! the result back into the conversation.
//!
//! ## Features
//!
//! - **Two transports**: line-delimited JSON over stdio, or JSON POSTed over HTTP
//! - **Merged catalog**: built-in SQL tools, imported remote tools, file and git wrappers
//! - **Safe wrappers**: paths confined to configured roots, build artifacts never staged
//! - **Table rendering**: record lists become Markdown tables
//!
//! ## Quick Start
//!
//! ```bash
//! # Start chatting with every configured server
//! toolrelay
//!
//! # See what the model would be offered
//! toolrelay tools
//! ```

#![forbid(unsafe_code)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod ai;
pub mod core;
pub mod dispatch;
pub mod mcp;
pub mod shortcuts;

pub use ai::{ChatModel, OpenAIProvider, Orchestrator};
pub use core::Config;
pub use dispatch::{render, DispatchRouter, PendingCall, ToolCatalog, ToolResult};
pub use mcp::{ProtocolSession, SessionManager, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "toolrelay";
