//! Session manager for multiple MCP servers.
//!
//! Connects the configured servers, keeps the sessions that came up and
//! records why the others did not.

use std::collections::HashMap;

use super::session::{ProtocolSession, SessionError};
use super::transport;
use crate::core::{Config, ConfigError};

/// Error type for session manager operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Required server '{server}' is unavailable: {source}")]
    RequiredUnavailable {
        server: String,
        #[source]
        source: SessionError,
    },
}

/// A server that could not be connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFailure {
    /// Server name
    pub server: String,
    /// Why the connection failed
    pub error: String,
}

/// Owns every live protocol session.
#[derive(Default)]
pub struct SessionManager {
    /// Sessions by server name
    sessions: HashMap<String, ProtocolSession>,
    /// Server names in connection order
    order: Vec<String>,
}

impl SessionManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect every server selected by the configuration.
    pub fn connect_all(&mut self, config: &Config) -> Result<Vec<ServerFailure>, ManagerError> {
        let names = config.connect_names();
        self.connect(config, &names)
    }

    /// Connect the named servers.
    ///
    /// Optional servers that fail are returned as [`ServerFailure`]s. A
    /// required server that fails aborts with an error.
    pub fn connect(&mut self, config: &Config, names: &[String]) -> Result<Vec<ServerFailure>, ManagerError> {
        let mut failures = Vec::new();

        for name in names {
            if self.sessions.contains_key(name) {
                continue;
            }
            let required = config.is_required(name);

            let Some(descriptor) = config.server(name) else {
                let error = match config.issue_for(name) {
                    Some(issue) => ConfigError::Misconfigured { server: name.clone(), message: issue.message.clone() },
                    None => ConfigError::MissingServer(name.clone()),
                };
                if required {
                    return Err(error.into());
                }
                tracing::warn!(server = %name, error = %error, "Server unavailable");
                failures.push(ServerFailure { server: name.clone(), error: error.to_string() });
                continue;
            };

            let connected = transport::open(descriptor)
                .map_err(SessionError::from)
                .and_then(|channel| ProtocolSession::connect(name.clone(), channel));

            match connected {
                Ok(session) => self.insert(session),
                Err(source) if required => {
                    return Err(ManagerError::RequiredUnavailable { server: name.clone(), source });
                }
                Err(e) => {
                    tracing::warn!(server = %name, error = %e, "Server unavailable");
                    failures.push(ServerFailure { server: name.clone(), error: e.to_string() });
                }
            }
        }

        Ok(failures)
    }

    /// Adopt an already connected session, replacing any previous one of the
    /// same name.
    pub fn insert(&mut self, session: ProtocolSession) {
        let name = session.server().to_string();
        if let Some(mut previous) = self.sessions.insert(name.clone(), session) {
            previous.close();
        } else {
            self.order.push(name);
        }
    }

    /// Get a session by server name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ProtocolSession> {
        self.sessions.get_mut(name)
    }

    /// Get a session by server name.
    pub fn get(&self, name: &str) -> Option<&ProtocolSession> {
        self.sessions.get(name)
    }

    /// Check if a server has a ready session.
    pub fn is_connected(&self, name: &str) -> bool {
        self.sessions.get(name).is_some_and(ProtocolSession::is_ready)
    }

    /// Connected server names, in connection order.
    pub fn server_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Number of sessions held.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is held.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close every session. Idempotent.
    pub fn close_all(&mut self) {
        for name in self.order.drain(..) {
            if let Some(mut session) = self.sessions.remove(&name) {
                session.close();
            }
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.close_all();
    }
}
