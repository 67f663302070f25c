//! Append-only JSONL event log.
//!
//! One JSON object per line, each stamped with a `ts` field. Writing is
//! fire-and-forget from the caller's point of view.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// JSONL event sink.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Open a log at `path`, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    /// Log file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event, reporting I/O failures.
    pub fn try_log(&self, event: &str, fields: Value) -> io::Result<()> {
        let line = serde_json::to_string(&build_record(event, fields))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)
    }

    /// Append one event; failures are reported through tracing only.
    pub fn log(&self, event: &str, fields: Value) {
        if let Err(e) = self.try_log(event, fields) {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to write event log");
        }
    }
}

/// `{"ts": .., "event": .., ...fields}`; non-object fields land under `data`.
fn build_record(event: &str, fields: Value) -> Value {
    let mut record = Map::new();
    record.insert("ts".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));
    record.insert("event".to_string(), Value::String(event.to_string()));

    match fields {
        Value::Object(map) => {
            for (key, value) in map {
                if key != "ts" && key != "event" {
                    record.insert(key, value);
                }
            }
        }
        Value::Null => {}
        other => {
            record.insert("data".to_string(), other);
        }
    }

    Value::Object(record)
}
