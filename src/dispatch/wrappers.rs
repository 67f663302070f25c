//! Friendly wrappers over the filesystem and git servers.
//!
//! Each wrapper takes model-shaped arguments, resolves paths against a
//! configured root and produces the arguments the backing server expects.

use std::path::{Component, Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::core::HostConfig;

/// Path prefixes that are never staged.
const BLOCKED_PREFIXES: &[&str] =
    &[".git/", "build/", "dist/", "target/", "__pycache__/", "node_modules/", ".venv/"];

/// File extensions that are never staged.
const BLOCKED_EXTENSIONS: &[&str] = &[".pyc", ".pyo", ".o", ".so", ".class", ".log"];

/// Default `max_count` for `git_log`.
const DEFAULT_LOG_COUNT: u64 = 10;

/// Which server family a wrapper targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperFamily {
    /// File operations (FS server)
    Filesystem,
    /// Repository operations (Git server)
    Git,
}

/// A wrapper operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapperKind {
    FsReadFile,
    FsWriteFile,
    FsListDirectory,
    GitStatus,
    GitAdd,
    GitCommit,
    GitDiffUnstaged,
    GitLog,
}

impl WrapperKind {
    /// Every wrapper, in catalog order.
    pub const ALL: [WrapperKind; 8] = [
        Self::FsReadFile,
        Self::FsWriteFile,
        Self::FsListDirectory,
        Self::GitStatus,
        Self::GitAdd,
        Self::GitCommit,
        Self::GitDiffUnstaged,
        Self::GitLog,
    ];

    /// Name offered to the model.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::FsReadFile => "fs_read_file",
            Self::FsWriteFile => "fs_write_file",
            Self::FsListDirectory => "fs_list_directory",
            Self::GitStatus => "git_status",
            Self::GitAdd => "git_add",
            Self::GitCommit => "git_commit",
            Self::GitDiffUnstaged => "git_diff_unstaged",
            Self::GitLog => "git_log",
        }
    }

    /// Tool name on the backing server.
    pub fn remote_name(&self) -> &'static str {
        match self {
            Self::FsReadFile => "read_file",
            Self::FsWriteFile => "write_file",
            Self::FsListDirectory => "list_directory",
            Self::GitStatus => "git_status",
            Self::GitAdd => "git_add",
            Self::GitCommit => "git_commit",
            Self::GitDiffUnstaged => "git_diff_unstaged",
            Self::GitLog => "git_log",
        }
    }

    /// Server family.
    pub fn family(&self) -> WrapperFamily {
        match self {
            Self::FsReadFile | Self::FsWriteFile | Self::FsListDirectory => WrapperFamily::Filesystem,
            _ => WrapperFamily::Git,
        }
    }

    /// Description offered to the model.
    pub fn description(&self) -> &'static str {
        match self {
            Self::FsReadFile => "Read a text file. The path is relative to the workspace root.",
            Self::FsWriteFile => "Write a text file, replacing its content. The path is relative to the workspace root.",
            Self::FsListDirectory => "List a directory. The path is relative to the workspace root (default \".\").",
            Self::GitStatus => "Show the working tree status of the repository.",
            Self::GitAdd => "Stage files for commit. Build artifacts and VCS internals are refused.",
            Self::GitCommit => "Record staged changes with a commit message.",
            Self::GitDiffUnstaged => "Show unstaged changes in the working tree.",
            Self::GitLog => "Show recent commits.",
        }
    }

    /// JSON schema of the model-facing arguments.
    pub fn parameters(&self) -> Value {
        match self {
            Self::FsReadFile => json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
            Self::FsWriteFile => json!({
                "type": "object",
                "properties": {"path": {"type": "string"}, "content": {"type": "string"}},
                "required": ["path", "content"]
            }),
            Self::FsListDirectory => json!({
                "type": "object",
                "properties": {"path": {"type": "string"}}
            }),
            Self::GitStatus | Self::GitDiffUnstaged => json!({"type": "object", "properties": {}}),
            Self::GitAdd => json!({
                "type": "object",
                "properties": {"files": {
                    "oneOf": [{"type": "array", "items": {"type": "string"}}, {"type": "string"}]
                }},
                "required": ["files"]
            }),
            Self::GitCommit => json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
            Self::GitLog => json!({
                "type": "object",
                "properties": {"max_count": {"type": "integer", "minimum": 1}}
            }),
        }
    }
}

/// Error type for wrapper argument transforms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WrapperError {
    #[error("Missing required argument '{0}'")]
    MissingField(&'static str),

    #[error("Argument '{field}' must be {expected}")]
    InvalidField { field: &'static str, expected: &'static str },

    #[error("Path '{path}' escapes the root {root}")]
    EscapesRoot { path: String, root: String },

    #[error("Nothing to stage: every path was refused ({})", .dropped.join(", "))]
    NothingToStage { dropped: Vec<String> },
}

/// Roots that relative wrapper paths resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoots {
    /// Root for file operations
    pub fs_root: PathBuf,
    /// Root for repository operations
    pub repo_root: PathBuf,
}

impl WorkspaceRoots {
    /// Create roots, made absolute and normalized.
    pub fn new(fs_root: impl AsRef<Path>, repo_root: impl AsRef<Path>) -> Self {
        Self { fs_root: absolute_root(fs_root.as_ref()), repo_root: absolute_root(repo_root.as_ref()) }
    }

    /// Roots from the host settings.
    pub fn from_host(host: &HostConfig) -> Self {
        Self::new(&host.fs_root, &host.repo_root)
    }
}

fn absolute_root(root: &Path) -> PathBuf {
    let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    normalize(&absolute)
}

/// Fold `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_normal = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if at_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `raw` against `root`, refusing results outside it.
pub fn resolve_under(root: &Path, raw: &str) -> Result<PathBuf, WrapperError> {
    let cleaned = raw.replace('\\', "/");
    let resolved = normalize(&root.join(cleaned));
    if resolved.starts_with(root) {
        Ok(resolved)
    } else {
        Err(WrapperError::EscapesRoot { path: raw.to_string(), root: root.display().to_string() })
    }
}

/// Whether a repository-relative path may be staged.
///
/// The repository root itself (`.`) and a bare blocked directory are refused
/// along with anything beneath them.
pub fn is_stageable(relative: &str) -> bool {
    if relative.is_empty() || relative == "." {
        return false;
    }
    let blocked_dir = BLOCKED_PREFIXES
        .iter()
        .any(|prefix| relative.starts_with(prefix) || relative == prefix.trim_end_matches('/'));
    if blocked_dir {
        return false;
    }
    !BLOCKED_EXTENSIONS.iter().any(|ext| relative.ends_with(ext))
}

/// Split candidate paths into stageable repository-relative paths and the
/// ones that were refused.
pub fn filter_stage_paths(files: &[String], repo_root: &Path) -> (Vec<String>, Vec<String>) {
    let mut kept = Vec::new();
    let mut dropped = Vec::new();

    for raw in files {
        let mut cleaned = raw.trim().replace('\\', "/");
        while let Some(rest) = cleaned.strip_prefix("./") {
            cleaned = rest.to_string();
        }

        let relative = resolve_under(repo_root, &cleaned).ok().and_then(|resolved| {
            resolved.strip_prefix(repo_root).ok().map(|rel| {
                let joined = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
                if joined.is_empty() {
                    ".".to_string()
                } else {
                    joined
                }
            })
        });

        match relative {
            Some(rel) if !cleaned.is_empty() && is_stageable(&rel) => kept.push(rel),
            _ => dropped.push(raw.clone()),
        }
    }

    (kept, dropped)
}

/// Build the backing server's arguments for a wrapper call.
pub fn transform(
    kind: WrapperKind,
    roots: &WorkspaceRoots,
    args: &Map<String, Value>,
) -> Result<Map<String, Value>, WrapperError> {
    let mut out = Map::new();

    match kind {
        WrapperKind::FsReadFile => {
            let path = resolve_under(&roots.fs_root, required_str(args, "path")?)?;
            out.insert("path".to_string(), path_value(&path));
        }
        WrapperKind::FsWriteFile => {
            let path = resolve_under(&roots.fs_root, required_str(args, "path")?)?;
            let content = required_str(args, "content")?;
            out.insert("path".to_string(), path_value(&path));
            out.insert("content".to_string(), Value::String(content.to_string()));
        }
        WrapperKind::FsListDirectory => {
            let raw = optional_str(args, "path")?.filter(|p| !p.trim().is_empty()).unwrap_or(".");
            let path = resolve_under(&roots.fs_root, raw)?;
            out.insert("path".to_string(), path_value(&path));
        }
        WrapperKind::GitStatus | WrapperKind::GitDiffUnstaged => {
            out.insert("repo_path".to_string(), path_value(&roots.repo_root));
        }
        WrapperKind::GitAdd => {
            let files = stage_candidates(args)?;
            let (kept, dropped) = filter_stage_paths(&files, &roots.repo_root);
            if kept.is_empty() {
                return Err(WrapperError::NothingToStage { dropped });
            }
            if !dropped.is_empty() {
                tracing::warn!(dropped = ?dropped, "Refused to stage blocked paths");
            }
            out.insert("repo_path".to_string(), path_value(&roots.repo_root));
            out.insert("files".to_string(), json!(kept));
        }
        WrapperKind::GitCommit => {
            let message = required_str(args, "message")?;
            if message.trim().is_empty() {
                return Err(WrapperError::MissingField("message"));
            }
            out.insert("repo_path".to_string(), path_value(&roots.repo_root));
            out.insert("message".to_string(), Value::String(message.to_string()));
        }
        WrapperKind::GitLog => {
            let max_count = match args.get("max_count") {
                None | Some(Value::Null) => DEFAULT_LOG_COUNT,
                Some(value) => value
                    .as_u64()
                    .filter(|n| *n > 0)
                    .ok_or(WrapperError::InvalidField { field: "max_count", expected: "a positive integer" })?,
            };
            out.insert("repo_path".to_string(), path_value(&roots.repo_root));
            out.insert("max_count".to_string(), json!(max_count));
        }
    }

    Ok(out)
}

fn required_str<'a>(args: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, WrapperError> {
    optional_str(args, field)?.ok_or(WrapperError::MissingField(field))
}

fn optional_str<'a>(args: &'a Map<String, Value>, field: &'static str) -> Result<Option<&'a str>, WrapperError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(WrapperError::InvalidField { field, expected: "a string" }),
    }
}

/// `files` as a list, accepting a single string too.
fn stage_candidates(args: &Map<String, Value>) -> Result<Vec<String>, WrapperError> {
    const EXPECTED: &str = "a list of paths or a single path";
    match args.get("files") {
        None | Some(Value::Null) => Err(WrapperError::MissingField("files")),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or(WrapperError::InvalidField { field: "files", expected: EXPECTED }),
        Some(_) => Err(WrapperError::InvalidField { field: "files", expected: EXPECTED }),
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}
