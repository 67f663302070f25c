//! Configuration management for toolrelay.
//!
//! Handles loading the host settings and the MCP server list from TOML or
//! JSON files, then layering environment overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default system prompt for the chat loop.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a database and repository assistant with MCP tools. \
When the user asks to load a .sql schema, or to explain, diagnose or optimize a query, call the \
matching tools BEFORE answering. You can also reach the filesystem (FS) and git (Git) servers. \
When you receive tool results, summarize them and recommend next steps.";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Server '{0}' is required but not configured")]
    MissingServer(String),

    #[error("Server '{server}' is misconfigured: {message}")]
    Misconfigured { server: String, message: String },
}

/// Application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Host settings (`[host]` table)
    pub host: HostConfig,

    /// Servers that decoded cleanly, in file order
    pub servers: Vec<ServerDescriptor>,

    /// Entries that were skipped, with the reason
    pub issues: Vec<ConfigIssue>,

    /// File the configuration was read from, if any
    pub source: Option<PathBuf>,
}

/// Host-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Chat model identifier
    pub model: String,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// API key; only ever taken from the environment
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Root directory for file wrapper operations
    pub fs_root: PathBuf,

    /// Root directory for repository wrapper operations
    pub repo_root: PathBuf,

    /// JSONL event log location
    pub log_path: PathBuf,

    /// Server that receives the built-in SQL tools
    pub local_server: String,

    /// Server that receives file wrapper operations
    pub fs_server: String,

    /// Server that receives repository wrapper operations
    pub git_server: String,

    /// Servers to connect at startup (defaults to every configured server)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect: Option<Vec<String>>,

    /// Servers whose absence aborts startup
    pub required: Vec<String>,

    /// Sampling temperature for the tool-selecting completion
    pub temperature: f32,

    /// Sampling temperature for the follow-up completion
    pub follow_up_temperature: f32,

    /// Token limit per completion
    pub max_tokens: u32,

    /// System prompt seeded into memory
    pub system_prompt: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            fs_root: PathBuf::from("."),
            repo_root: PathBuf::from("."),
            log_path: PathBuf::from("logs/client.jsonl"),
            local_server: "SQLScout".to_string(),
            fs_server: "FS".to_string(),
            git_server: "Git".to_string(),
            connect: None,
            required: Vec::new(),
            temperature: 0.3,
            follow_up_temperature: 0.2,
            max_tokens: 600,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// A configured MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Server name (unique identifier)
    pub name: String,

    /// Transport and its parameters
    #[serde(flatten)]
    pub connection: Connection,

    /// Whether `tools/list` is imported into the model catalog at startup
    #[serde(default, alias = "catalogProvider")]
    pub catalog_provider: bool,
}

/// Transport-specific connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum Connection {
    /// Child process speaking line-delimited JSON
    Stdio(StdioParams),
    /// JSON bodies POSTed to an endpoint
    Http(HttpParams),
}

impl Connection {
    /// Short transport label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stdio(_) => "stdio",
            Self::Http(_) => "http",
        }
    }
}

/// Parameters for a stdio server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdioParams {
    /// Command to run
    pub command: String,

    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory
    #[serde(default, alias = "workingDir", skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Environment overrides (values support `$VAR` expansion)
    #[serde(default, alias = "envOverrides")]
    pub env: HashMap<String, String>,
}

/// Parameters for an HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpParams {
    /// Base URL, e.g. `http://localhost:5000`
    #[serde(alias = "baseUrl", alias = "url")]
    pub base_url: String,

    /// Path appended to the base URL
    #[serde(default = "default_endpoint_path", alias = "endpointPath")]
    pub endpoint_path: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_seconds", alias = "timeoutSeconds")]
    pub timeout_seconds: u64,
}

impl HttpParams {
    /// Full endpoint URL.
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.endpoint_path.is_empty() {
            base.to_string()
        } else if self.endpoint_path.starts_with('/') {
            format!("{}{}", base, self.endpoint_path)
        } else {
            format!("{}/{}", base, self.endpoint_path)
        }
    }
}

fn default_endpoint_path() -> String {
    "/mcp".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// A server entry that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Server name, or its list position when the name is missing
    pub server: String,
    /// Why it was skipped
    pub message: String,
}

impl Config {
    /// Load configuration.
    ///
    /// With an explicit path, that file must exist. Otherwise looks for:
    /// 1. `toolrelay.toml` in current directory
    /// 2. `mcp_config.json` in current directory
    /// 3. `~/.config/toolrelay/config.toml`
    /// 4. Falls back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        for local in ["toolrelay.toml", "mcp_config.json"] {
            let candidate = PathBuf::from(local);
            if candidate.exists() {
                return Self::load_from_file(&candidate);
            }
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file. `.json` files are read as
    /// JSON, everything else as TOML.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let mut config = if is_json { Self::from_json_str(&content)? } else { Self::from_toml_str(&content)? };
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let value: Value = toml::from_str(content)?;
        Self::from_value(value)
    }

    /// Parse a JSON document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    /// Build from a parsed document. Server entries are decoded one by one so
    /// a bad entry only disables that server.
    fn from_value(value: Value) -> Result<Self, ConfigError> {
        let host = match value.get("host") {
            Some(host) => serde_json::from_value(host.clone())
                .map_err(|e| ConfigError::Invalid(format!("[host]: {}", e)))?,
            None => HostConfig::default(),
        };

        let entries = match value.get("servers") {
            None => Vec::new(),
            Some(Value::Array(entries)) => entries.clone(),
            Some(_) => return Err(ConfigError::Invalid("`servers` must be a list".to_string())),
        };

        let mut servers: Vec<ServerDescriptor> = Vec::new();
        let mut issues = Vec::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let label = entry
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("servers[{}]", index));

            match serde_json::from_value::<ServerDescriptor>(entry) {
                Ok(descriptor) if servers.iter().any(|s| s.name == descriptor.name) => {
                    issues.push(ConfigIssue {
                        server: label,
                        message: "duplicate server name; only the first entry is used".to_string(),
                    });
                }
                Ok(descriptor) => servers.push(descriptor),
                Err(e) => {
                    tracing::warn!(server = %label, error = %e, "Skipping server entry");
                    issues.push(ConfigIssue { server: label, message: e.to_string() });
                }
            }
        }

        Ok(Self { host, servers, issues, source: None })
    }

    /// Apply overrides from the process environment.
    pub fn with_process_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.host.api_key = Some(key);
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.host.model = model;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.host.base_url = url;
        }
        if let Some(root) = lookup("TOOLRELAY_FS_ROOT") {
            self.host.fs_root = PathBuf::from(root);
        }
        if let Some(root) = lookup("TOOLRELAY_REPO_ROOT") {
            self.host.repo_root = PathBuf::from(root);
        }
        self
    }

    /// Look up a configured server.
    pub fn server(&self, name: &str) -> Option<&ServerDescriptor> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Whether a server is present (cleanly decoded) in the configuration.
    pub fn has_server(&self, name: &str) -> bool {
        self.server(name).is_some()
    }

    /// Look up the issue recorded for a server entry.
    pub fn issue_for(&self, name: &str) -> Option<&ConfigIssue> {
        self.issues.iter().find(|i| i.server == name)
    }

    /// Names of the servers to connect at startup.
    pub fn connect_names(&self) -> Vec<String> {
        match self.host.connect {
            Some(ref names) => names.clone(),
            None => self.servers.iter().map(|s| s.name.clone()).collect(),
        }
    }

    /// Whether a server is required for startup.
    pub fn is_required(&self, name: &str) -> bool {
        self.host.required.iter().any(|r| r == name)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(crate::APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const SAMPLE: &str = r#"
        [host]
        model = "gpt-4o"
        fs_root = "/srv/files"
        required = ["SQLScout"]

        [[servers]]
        name = "SQLScout"
        transport = "stdio"
        command = "python"
        args = ["-m", "sqlscout"]
        env = { DB_PATH = "scout.db" }

        [[servers]]
        name = "Admin"
        transport = "http"
        base_url = "http://localhost:5000/"
        catalog_provider = true
    "#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host.model, "gpt-4o-mini");
        assert_eq!(config.host.local_server, "SQLScout");
        assert_eq!(config.host.log_path, PathBuf::from("logs/client.jsonl"));
        assert!(config.servers.is_empty());
    }

    #[test]
    fn test_toml_deserialization() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.host.model, "gpt-4o");
        assert_eq!(config.host.fs_root, PathBuf::from("/srv/files"));
        assert_eq!(config.host.max_tokens, 600);
        assert!(config.is_required("SQLScout"));
        assert_eq!(config.servers.len(), 2);
        assert!(config.issues.is_empty());

        match &config.server("SQLScout").unwrap().connection {
            Connection::Stdio(params) => {
                assert_eq!(params.command, "python");
                assert_eq!(params.args, vec!["-m", "sqlscout"]);
                assert_eq!(params.env.get("DB_PATH").map(String::as_str), Some("scout.db"));
            }
            other => panic!("expected stdio, got {:?}", other),
        }

        let admin = config.server("Admin").unwrap();
        assert!(admin.catalog_provider);
        match &admin.connection {
            Connection::Http(params) => {
                assert_eq!(params.endpoint(), "http://localhost:5000/mcp");
                assert_eq!(params.timeout_seconds, 30);
            }
            other => panic!("expected http, got {:?}", other),
        }
    }

    #[test]
    fn test_json_with_camel_case_fields() {
        let json = r#"{
            "servers": [
                {"name": "FS", "transport": "stdio", "command": "npx",
                 "args": ["-y", "@modelcontextprotocol/server-filesystem", "."], "workingDir": "/tmp"},
                {"name": "Remote", "transport": "http", "baseUrl": "http://h:1",
                 "endpointPath": "rpc", "timeoutSeconds": 5, "catalogProvider": true}
            ]
        }"#;

        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.servers.len(), 2);
        match &config.server("FS").unwrap().connection {
            Connection::Stdio(params) => assert_eq!(params.cwd, Some(PathBuf::from("/tmp"))),
            other => panic!("expected stdio, got {:?}", other),
        }
        let remote = config.server("Remote").unwrap();
        assert!(remote.catalog_provider);
        match &remote.connection {
            Connection::Http(params) => {
                assert_eq!(params.endpoint(), "http://h:1/rpc");
                assert_eq!(params.timeout_seconds, 5);
            }
            other => panic!("expected http, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_entries_only_disable_their_server() {
        let toml_str = r#"
            [[servers]]
            name = "Good"
            transport = "stdio"
            command = "cat"

            [[servers]]
            name = "Sse"
            transport = "sse"
            url = "http://x"

            [[servers]]
            name = "NoTransport"
            command = "cat"

            [[servers]]
            name = "Good"
            transport = "stdio"
            command = "tac"
        "#;

        let config = Config::from_toml_str(toml_str).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.issues.len(), 3);
        assert!(config.issue_for("Sse").unwrap().message.contains("sse"));
        assert!(config.issue_for("NoTransport").unwrap().message.contains("transport"));
        assert!(config.issue_for("Good").unwrap().message.contains("duplicate"));
    }

    #[test]
    fn test_servers_must_be_a_list() {
        let err = Config::from_json_str(r#"{"servers": {"name": "x"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_connect_names_default_to_all_servers() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.connect_names(), vec!["SQLScout", "Admin"]);

        config.host.connect = Some(vec!["Admin".to_string()]);
        assert_eq!(config.connect_names(), vec!["Admin"]);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().with_env(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "OPENAI_MODEL" => Some("gpt-4.1".to_string()),
            "TOOLRELAY_REPO_ROOT" => Some("/repo".to_string()),
            _ => None,
        });

        assert_eq!(config.host.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.host.model, "gpt-4.1");
        assert_eq!(config.host.repo_root, PathBuf::from("/repo"));
        assert_eq!(config.host.fs_root, PathBuf::from("."));
    }

    #[test]
    #[serial(toolrelay_env)]
    fn test_process_env_overrides() {
        let original = std::env::var("TOOLRELAY_FS_ROOT").ok();
        std::env::set_var("TOOLRELAY_FS_ROOT", "/from/env");

        let config = Config::default().with_process_env();

        match original {
            Some(val) => std::env::set_var("TOOLRELAY_FS_ROOT", val),
            None => std::env::remove_var("TOOLRELAY_FS_ROOT"),
        }

        assert_eq!(config.host.fs_root, PathBuf::from("/from/env"));
    }

    #[test]
    fn test_load_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("mcp_config.json");
        std::fs::write(&json_path, r#"{"servers":[{"name":"A","transport":"stdio","command":"cat"}]}"#)
            .unwrap();

        let config = Config::load(Some(&json_path)).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.source, Some(json_path));

        let missing = Config::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
