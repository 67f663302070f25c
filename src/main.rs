//! toolrelay - chat host routing model tool calls to MCP servers.
//!
//! Starts an interactive chat by default; the other subcommands inspect the
//! configuration, list the tool catalog or call one tool directly.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde_json::{json, Map, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use toolrelay::ai::{OpenAIProvider, Orchestrator, TurnSettings};
use toolrelay::core::{Config, Connection, EventLog};
use toolrelay::dispatch::{render, DispatchRouter, PendingCall, ToolCatalog, ToolResult, WorkspaceRoots};
use toolrelay::mcp::SessionManager;
use toolrelay::shortcuts::{self, Shortcut};

/// Chat host that routes model tool calls to MCP servers
#[derive(Parser)]
#[command(name = "toolrelay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (TOML, or JSON by extension)
    #[arg(short, long, global = true, env = "TOOLRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive chat (default)
    Chat {
        /// Default server for `:tools`
        #[arg(short, long)]
        server: Option<String>,
    },

    /// List configured servers
    Servers,

    /// Show the merged tool catalog, or one server's raw tools/list response
    Tools {
        /// Only query this server
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Call one tool on one server
    Call {
        /// Server name
        server: String,

        /// Tool name as reported by tools/list
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            cmd_completions(shell);
        }
        Some(Commands::Servers) => {
            cmd_servers(&load_config(cli.config.as_deref())?);
        }
        Some(Commands::Tools { server }) => {
            cmd_tools(&load_config(cli.config.as_deref())?, server.as_deref())?;
        }
        Some(Commands::Call { server, tool, args }) => {
            cmd_call(&load_config(cli.config.as_deref())?, &server, &tool, args.as_deref())?;
        }
        None => {
            cmd_chat(&load_config(cli.config.as_deref())?, None)?;
        }
        Some(Commands::Chat { server }) => {
            cmd_chat(&load_config(cli.config.as_deref())?, server)?;
        }
    }

    Ok(())
}

/// Load configuration and apply environment overrides.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?.with_process_env();
    for issue in &config.issues {
        tracing::warn!(server = %issue.server, "Skipping server entry: {}", issue.message);
    }
    Ok(config)
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "toolrelay", &mut io::stdout());
}

/// List configured servers and skipped entries.
fn cmd_servers(config: &Config) {
    println!("Configured MCP servers:\n");

    if config.servers.is_empty() {
        println!("  No MCP servers configured.");
        println!("\n  Add servers to toolrelay.toml:");
        println!("    [[servers]]");
        println!("    name = \"SQLScout\"");
        println!("    transport = \"stdio\"");
        println!("    command = \"python\"");
        println!("    args = [\"-m\", \"sqlscout.server\"]");
    } else {
        for server in &config.servers {
            let target = match &server.connection {
                Connection::Stdio(params) => {
                    let mut line = params.command.clone();
                    if !params.args.is_empty() {
                        line.push(' ');
                        line.push_str(&params.args.join(" "));
                    }
                    line
                }
                Connection::Http(params) => params.endpoint(),
            };
            let provider = if server.catalog_provider { " (catalog provider)" } else { "" };
            let required = if config.is_required(&server.name) { " (required)" } else { "" };
            println!("  {} [{}] {}{}{}", server.name, server.connection.label(), target, provider, required);
        }
        println!("\nTotal: {} server(s)", config.servers.len());
    }

    if !config.issues.is_empty() {
        println!("\nSkipped entries:");
        for issue in &config.issues {
            println!("  {} - {}", issue.server, issue.message);
        }
    }
}

/// Print the merged catalog, or one server's raw listing.
fn cmd_tools(config: &Config, server: Option<&str>) -> Result<()> {
    let mut sessions = SessionManager::new();

    if let Some(name) = server {
        connect_one(&mut sessions, config, name)?;
        let session = sessions.get_mut(name).with_context(|| format!("Server '{}' is not connected", name))?;
        let response = session.list_tools()?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        sessions.close_all();
        return Ok(());
    }

    for failure in sessions.connect_all(config)? {
        eprintln!("Warning: server '{}' unavailable: {}", failure.server, failure.error);
    }

    let catalog = ToolCatalog::build(config, &mut sessions);
    println!("Available tools:\n");
    for tool in catalog.iter() {
        let bound = tool.route.server().unwrap_or("any");
        print!("  [{} {}] {}", tool.route.label(), bound, tool.name);
        if !tool.description.is_empty() {
            print!(" - {}", tool.description);
        }
        println!();
    }
    println!("\nTotal: {} tool(s)", catalog.len());

    sessions.close_all();
    Ok(())
}

/// Call one tool directly and print the rendered result.
fn cmd_call(config: &Config, server: &str, tool: &str, args: Option<&str>) -> Result<()> {
    let arguments: Map<String, Value> = match args {
        Some(raw) => match serde_json::from_str(raw).context("Invalid JSON arguments")? {
            Value::Object(map) => map,
            _ => anyhow::bail!("--args must be a JSON object"),
        },
        None => Map::new(),
    };

    let mut sessions = SessionManager::new();
    connect_one(&mut sessions, config, server)?;
    let session = sessions.get_mut(server).with_context(|| format!("Server '{}' is not connected", server))?;

    let response = session.call_tool(tool, arguments).with_context(|| format!("Failed to call tool '{}'", tool))?;
    let result = ToolResult::from_response(response);
    println!("{}", render(&result));
    sessions.close_all();

    if result.is_error {
        anyhow::bail!("Tool '{}' returned an error", tool);
    }
    Ok(())
}

/// Connect exactly one server, failing if it does not come up.
fn connect_one(sessions: &mut SessionManager, config: &Config, name: &str) -> Result<()> {
    let failures = sessions.connect(config, &[name.to_string()])?;
    if let Some(failure) = failures.into_iter().next() {
        anyhow::bail!("Server '{}' unavailable: {}", failure.server, failure.error);
    }
    Ok(())
}

/// Run the interactive chat.
fn cmd_chat(config: &Config, server: Option<String>) -> Result<()> {
    let host = &config.host;
    let model = OpenAIProvider::from_config(host).context("Chat needs a model backend")?;

    let event_log = match EventLog::open(&host.log_path) {
        Ok(log) => Some(log),
        Err(e) => {
            eprintln!("Warning: event log disabled ({}): {}", host.log_path.display(), e);
            None
        }
    };

    let mut sessions = SessionManager::new();
    for failure in sessions.connect_all(config)? {
        println!("(note) server '{}' unavailable: {}", failure.server, failure.error);
        if let Some(ref log) = event_log {
            log.log("server/unavailable", json!({"server": failure.server, "error": failure.error}));
        }
    }

    let catalog = ToolCatalog::build(config, &mut sessions);
    let router = DispatchRouter::new(WorkspaceRoots::from_host(host));
    let mut orchestrator = Orchestrator::new(model, catalog, sessions, router, TurnSettings::from_host(host))
        .with_system_prompt(&host.system_prompt);
    if let Some(log) = event_log {
        orchestrator = orchestrator.with_event_log(log);
    }

    let default_server = server.unwrap_or_else(|| host.local_server.clone());

    println!("Chat started. ({})", shortcuts::HELP);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("you> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;

        match shortcuts::parse(&line) {
            Shortcut::Empty => {}
            Shortcut::Quit => break,
            Shortcut::Invalid(message) => println!("{}", message),
            Shortcut::Tools { server } => {
                let target = server.unwrap_or_else(|| default_server.clone());
                print_tool_listing(&mut orchestrator, &target);
                orchestrator.log_event("shortcut", json!({"command": "tools", "server": target}));
            }
            Shortcut::Load { path } => {
                match std::fs::read_to_string(&path) {
                    Ok(schema) => {
                        let mut arguments = Map::new();
                        arguments.insert("schema".to_string(), Value::String(schema));
                        let call = PendingCall::new(uuid::Uuid::new_v4().to_string(), "sql_load", arguments);
                        println!("{}", orchestrator.run_tool(&call).rendered);
                    }
                    Err(e) => println!("Error reading {}: {}", path.display(), e),
                }
                orchestrator.log_event("shortcut", json!({"command": "load", "path": path.display().to_string()}));
            }
            Shortcut::Local { tool, arguments } => {
                let call = PendingCall::new(uuid::Uuid::new_v4().to_string(), tool, arguments);
                println!("{}", orchestrator.run_tool(&call).rendered);
                orchestrator.log_event("shortcut", json!({"command": tool}));
            }
            Shortcut::Chat(text) => match orchestrator.turn(&text) {
                Ok(outcome) => {
                    for run in &outcome.tool_runs {
                        let marker = if run.is_error { "failed" } else { "ok" };
                        println!("  [{} -> {}] {}", run.tool, run.server.as_deref().unwrap_or("-"), marker);
                    }
                    println!("assistant:\n{}", outcome.answer);
                }
                Err(e) => eprintln!("Model error: {}", e),
            },
        }
    }

    orchestrator.shutdown();
    println!("Chat ended.");
    Ok(())
}

/// Print a server's raw `tools/list` envelope.
fn print_tool_listing<M: toolrelay::ChatModel>(orchestrator: &mut Orchestrator<M>, server: &str) {
    let Some(session) = orchestrator.sessions_mut().get_mut(server) else {
        println!("Server '{}' is not connected.", server);
        return;
    };

    match session.list_tools() {
        Ok(response) => match serde_json::to_string_pretty(&response) {
            Ok(text) => println!("{}", text),
            Err(e) => println!("Could not format response: {}", e),
        },
        Err(e) => println!("tools/list on '{}' failed: {}", server, e),
    }
}
