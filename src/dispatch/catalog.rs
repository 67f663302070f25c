//! Tool catalog offered to the model.
//!
//! Built once at startup from the static local tools, the listings of remote
//! catalog providers, the wrapper operations and the generic pass-through.
//! Registration order sets precedence: a later registration with the same
//! name replaces the earlier one.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value};

use super::wrappers::{WrapperFamily, WrapperKind};
use crate::core::Config;
use crate::mcp::{JsonRpcResponse, RemoteTool, SessionManager};

/// Name of the generic pass-through tool.
pub const PASSTHROUGH_TOOL: &str = "mcp_run";

/// A built-in tool served by the local server.
#[derive(Debug, Clone, Copy)]
pub struct LocalTool {
    /// Name offered to the model
    pub name: &'static str,
    /// Method name on the local server
    pub method: &'static str,
    /// Description offered to the model
    pub description: &'static str,
    /// Required string arguments
    pub fields: &'static [&'static str],
}

/// The static local tool table.
pub const LOCAL_TOOLS: &[LocalTool] = &[
    LocalTool {
        name: "sql_load",
        method: "sql.load",
        description: "Load a SQL schema (full .sql text).",
        fields: &["schema"],
    },
    LocalTool {
        name: "sql_explain",
        method: "sql.explain",
        description: "EXPLAIN QUERY PLAN for a query.",
        fields: &["query"],
    },
    LocalTool {
        name: "sql_diagnose",
        method: "sql.diagnose",
        description: "Static diagnosis of a query (SELECT *, leading-wildcard LIKE, functions in WHERE...).",
        fields: &["query"],
    },
    LocalTool {
        name: "sql_optimize",
        method: "sql.optimize",
        description: "Index and rewrite suggestions based on the diagnosis.",
        fields: &["query"],
    },
    LocalTool {
        name: "sql_apply",
        method: "sql.apply",
        description: "Apply DDL (CREATE/DROP INDEX, ALTER...).",
        fields: &["ddl"],
    },
    LocalTool {
        name: "sql_optimize_apply",
        method: "sql.optimize_apply",
        description: "Compare the plan before and after temporarily applying DDL.",
        fields: &["query", "ddl"],
    },
];

impl LocalTool {
    /// JSON schema of the arguments.
    pub fn parameters(&self) -> Value {
        let properties: serde_json::Map<String, Value> =
            self.fields.iter().map(|field| (field.to_string(), json!({"type": "string"}))).collect();
        json!({"type": "object", "properties": properties, "required": self.fields})
    }
}

/// Where a tool call is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRoute {
    /// `mcp_run`: server and tool come from the arguments
    Passthrough,
    /// A wrapper over the FS or Git server
    Wrapper { kind: WrapperKind, server: String },
    /// A tool imported from a catalog provider
    Remote { server: String },
    /// A built-in tool mapped to a method on the local server
    Local { server: String, method: String },
}

impl ToolRoute {
    /// Server the route is bound to, if fixed.
    pub fn server(&self) -> Option<&str> {
        match self {
            Self::Passthrough => None,
            Self::Wrapper { server, .. } | Self::Remote { server } | Self::Local { server, .. } => Some(server),
        }
    }

    /// Short label for listings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Wrapper { .. } => "wrapper",
            Self::Remote { .. } => "remote",
            Self::Local { .. } => "local",
        }
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    /// Tool name
    pub name: String,
    /// Description offered to the model
    pub description: String,
    /// JSON schema of the arguments
    pub parameters: Value,
    /// Where calls go
    pub route: ToolRoute,
}

/// Model-facing view of a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON schema of the arguments
    pub parameters: Value,
}

/// The merged tool catalog.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    /// Descriptors in registration order
    entries: Vec<ToolDescriptor>,
    /// Name -> position in `entries`
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the catalog for a configuration and its live sessions.
    ///
    /// Local tools and wrappers are registered when their server is
    /// configured; remote tools come from every connected catalog provider.
    pub fn build(config: &Config, sessions: &mut SessionManager) -> Self {
        let mut catalog = Self::new();
        let host = &config.host;

        if config.has_server(&host.local_server) {
            catalog.register_local(&host.local_server);
        }

        for descriptor in config.servers.iter().filter(|s| s.catalog_provider) {
            let Some(session) = sessions.get_mut(&descriptor.name) else {
                tracing::debug!(server = %descriptor.name, "Catalog provider not connected");
                continue;
            };
            match session.list_tools() {
                Ok(response) => {
                    let count = catalog.import_listing(&descriptor.name, &response);
                    tracing::info!(server = %descriptor.name, count, "Imported remote tools");
                }
                Err(e) => {
                    tracing::warn!(server = %descriptor.name, error = %e, "Failed to list remote tools");
                }
            }
        }

        if config.has_server(&host.fs_server) {
            catalog.register_wrappers(WrapperFamily::Filesystem, &host.fs_server);
        }
        if config.has_server(&host.git_server) {
            catalog.register_wrappers(WrapperFamily::Git, &host.git_server);
        }

        catalog.register_passthrough();
        catalog
    }

    /// Register a descriptor. A name already present is replaced.
    pub fn register(&mut self, descriptor: ToolDescriptor) {
        match self.index.get(&descriptor.name) {
            Some(&position) => {
                tracing::warn!(
                    tool = %descriptor.name,
                    previous = self.entries[position].route.server().unwrap_or("-"),
                    now = descriptor.route.server().unwrap_or("-"),
                    "Tool name shadowed by a later registration"
                );
                self.entries[position] = descriptor;
            }
            None => {
                self.index.insert(descriptor.name.clone(), self.entries.len());
                self.entries.push(descriptor);
            }
        }
    }

    /// Register the static local tools, bound to `server`.
    pub fn register_local(&mut self, server: &str) {
        for tool in LOCAL_TOOLS {
            self.register(ToolDescriptor {
                name: tool.name.to_string(),
                description: tool.description.to_string(),
                parameters: tool.parameters(),
                route: ToolRoute::Local { server: server.to_string(), method: tool.method.to_string() },
            });
        }
    }

    /// Register one wrapper family, bound to `server`.
    pub fn register_wrappers(&mut self, family: WrapperFamily, server: &str) {
        for kind in WrapperKind::ALL.into_iter().filter(|k| k.family() == family) {
            self.register(ToolDescriptor {
                name: kind.tool_name().to_string(),
                description: kind.description().to_string(),
                parameters: kind.parameters(),
                route: ToolRoute::Wrapper { kind, server: server.to_string() },
            });
        }
    }

    /// Register the generic pass-through tool.
    pub fn register_passthrough(&mut self) {
        self.register(ToolDescriptor {
            name: PASSTHROUGH_TOOL.to_string(),
            description: "Call any tool on any connected MCP server.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "server": {"type": "string", "description": "Server name from the configuration"},
                    "name": {"type": "string", "description": "Tool name as reported by tools/list"},
                    "arguments": {"type": "object", "description": "Tool arguments", "additionalProperties": true}
                },
                "required": ["server", "name", "arguments"]
            }),
            route: ToolRoute::Passthrough,
        });
    }

    /// Import the tools of a `tools/list` response, bound to `server`.
    ///
    /// Returns how many descriptors were registered. Malformed entries are
    /// skipped.
    pub fn import_listing(&mut self, server: &str, response: &JsonRpcResponse) -> usize {
        if let Some(ref error) = response.error {
            tracing::warn!(server = %server, error = %error, "tools/list returned an error");
            return 0;
        }

        let Some(tools) = response.result.as_ref().and_then(|r| r.get("tools")).and_then(Value::as_array) else {
            tracing::warn!(server = %server, "tools/list response has no tool list");
            return 0;
        };

        let mut imported = 0;
        for entry in tools {
            let tool = match serde_json::from_value::<RemoteTool>(entry.clone()) {
                Ok(tool) if !tool.name.is_empty() => tool,
                Ok(_) => {
                    tracing::warn!(server = %server, "Skipping remote tool without a name");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(server = %server, error = %e, "Skipping malformed remote tool");
                    continue;
                }
            };

            self.register(ToolDescriptor {
                name: tool.name,
                description: tool.description.unwrap_or_default(),
                parameters: tool.input_schema.unwrap_or_else(|| json!({"type": "object", "properties": {}})),
                route: ToolRoute::Remote { server: server.to_string() },
            });
            imported += 1;
        }

        imported
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&position| &self.entries[position])
    }

    /// Every descriptor in the shape the model expects.
    pub fn as_model_schema(&self) -> Vec<ToolSpec> {
        self.entries
            .iter()
            .map(|d| ToolSpec { name: d.name.clone(), description: d.description.clone(), parameters: d.parameters.clone() })
            .collect()
    }

    /// Descriptors bound to `server`.
    pub fn bound_to<'a>(&'a self, server: &'a str) -> impl Iterator<Item = &'a ToolDescriptor> + 'a {
        self.entries.iter().filter(move |d| d.route.server() == Some(server))
    }

    /// Iterate descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.entries.iter()
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
