//! Tool-server connection records

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection status reported by the transport collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    /// Handshake in progress
    #[default]
    Connecting,
    /// Ready to serve calls
    Connected,
    /// Clean teardown observed
    Disconnected,
    /// Unrecoverable transport failure
    Error,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A callable tool in a server's catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,

    /// Per-tool trust flag: when set, the orchestrator skips user confirmation
    #[serde(default)]
    pub auto_approve: bool,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            auto_approve: false,
        }
    }
}

/// State for one named tool-server connection
///
/// Owned exclusively by the hub; callers only see clones (snapshots).
#[derive(Debug, Clone)]
pub struct ServerConnection {
    /// Unique addressing key for all calls
    pub name: String,
    pub status: ServerStatus,
    /// Per-attempt timeout for calls to this server
    pub timeout: Duration,
    /// Tool catalog, populated on connect
    pub tools: Vec<ToolDescriptor>,
}

impl ServerConnection {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            status: ServerStatus::Connecting,
            timeout,
            tools: Vec::new(),
        }
    }

    /// Look up a tool in this server's catalog
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tool(name).is_some()
    }
}
