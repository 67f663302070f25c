//! REPL shortcut commands.
//!
//! Lines starting with `:` are commands; a line that asks to load a `.sql`
//! file in plain words is treated as `:load`. Everything else goes to the
//! model.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::dispatch::normalize;

static SQL_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r#"([^\s"'`]+\.sql)"#).expect("valid regex"));

/// Help line shown when the REPL starts.
pub const HELP: &str =
    "Commands: :tools [server], :load <file.sql>, :explain <SQL>, :diagnose <SQL>, :optimize <SQL>, :apply <DDL>, :quit";

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
pub enum Shortcut {
    /// Blank line
    Empty,
    /// Leave the REPL
    Quit,
    /// Print a server's raw `tools/list` envelope
    Tools { server: Option<String> },
    /// Read a schema file and send it to `sql_load`
    Load { path: PathBuf },
    /// Call a local tool directly
    Local { tool: &'static str, arguments: Map<String, Value> },
    /// Free text for the model
    Chat(String),
    /// A command that could not be understood
    Invalid(String),
}

/// Parse one REPL line.
pub fn parse(line: &str) -> Shortcut {
    let line = line.trim();
    if line.is_empty() {
        return Shortcut::Empty;
    }

    if let Some(command) = line.strip_prefix(':') {
        return parse_command(command);
    }

    let lower = line.to_lowercase();
    if (lower.contains("load") || lower.contains("carga")) && lower.contains(".sql") {
        return match SQL_PATH.captures(line).and_then(|c| c.get(1)) {
            Some(m) => Shortcut::Load { path: normalize(Path::new(m.as_str())) },
            None => Shortcut::Invalid("Could not find the .sql path. Try :load <file.sql>".to_string()),
        };
    }

    Shortcut::Chat(line.to_string())
}

fn parse_command(command: &str) -> Shortcut {
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    let local = |tool: &'static str, field: &str| {
        if rest.is_empty() {
            return Shortcut::Invalid(format!("Usage: :{} <{}>", name, field.to_uppercase()));
        }
        let mut arguments = Map::new();
        arguments.insert(field.to_string(), Value::String(rest.to_string()));
        Shortcut::Local { tool, arguments }
    };

    match name {
        "quit" => Shortcut::Quit,
        "tools" => Shortcut::Tools { server: rest.split_whitespace().next().map(str::to_string) },
        "load" if rest.is_empty() => Shortcut::Invalid("Usage: :load <file.sql>".to_string()),
        "load" => Shortcut::Load { path: PathBuf::from(rest) },
        "explain" => local("sql_explain", "query"),
        "diagnose" => local("sql_diagnose", "query"),
        "optimize" => local("sql_optimize", "query"),
        "apply" => local("sql_apply", "ddl"),
        _ => Shortcut::Invalid(format!("Unknown command ':{}'. {}", name, HELP)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_commands() {
        assert_eq!(parse("   "), Shortcut::Empty);
        assert_eq!(parse(":quit"), Shortcut::Quit);
        assert_eq!(parse(":tools"), Shortcut::Tools { server: None });
        assert_eq!(parse(":tools FS"), Shortcut::Tools { server: Some("FS".to_string()) });
        assert_eq!(parse(":load db/schema.sql"), Shortcut::Load { path: PathBuf::from("db/schema.sql") });
    }

    #[test]
    fn test_local_tool_commands() {
        match parse(":explain SELECT * FROM users WHERE id = 1") {
            Shortcut::Local { tool, arguments } => {
                assert_eq!(tool, "sql_explain");
                assert_eq!(arguments["query"], "SELECT * FROM users WHERE id = 1");
            }
            other => panic!("unexpected {:?}", other),
        }

        match parse(":apply CREATE INDEX idx ON t(a)") {
            Shortcut::Local { tool, arguments } => {
                assert_eq!(tool, "sql_apply");
                assert_eq!(arguments["ddl"], "CREATE INDEX idx ON t(a)");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_operands() {
        assert!(matches!(parse(":explain"), Shortcut::Invalid(msg) if msg.contains("QUERY")));
        assert!(matches!(parse(":load"), Shortcut::Invalid(_)));
        assert!(matches!(parse(":frobnicate"), Shortcut::Invalid(msg) if msg.contains(":frobnicate")));
    }

    #[test]
    fn test_natural_language_load() {
        assert_eq!(
            parse("please load the schema in ./db/../db/shop.sql now"),
            Shortcut::Load { path: PathBuf::from("db/shop.sql") }
        );
        assert_eq!(parse("Carga \"tienda.sql\" por favor"), Shortcut::Load { path: PathBuf::from("tienda.sql") });
        assert!(matches!(parse("load a .sql file"), Shortcut::Invalid(_)));
    }

    #[test]
    fn test_everything_else_is_chat() {
        assert_eq!(parse("why is my query slow?"), Shortcut::Chat("why is my query slow?".to_string()));
        assert_eq!(parse("load balancing tips"), Shortcut::Chat("load balancing tips".to_string()));
    }
}
