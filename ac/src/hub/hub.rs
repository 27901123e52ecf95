//! ToolHub - one call path for all external tool invocations

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::retry::{self, RetryError, RetryPolicy};

use super::{ServerConnection, ServerStatus, ToolDescriptor};

/// Errors from the transport collaborator
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport failure: {0}")]
    Failure(String),
}

/// Raw call primitive the hub wraps
///
/// Connect/disconnect mechanics live in the host; the hub only needs the call
/// itself plus lifecycle notifications via the `mark_*` methods.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn call(&self, server: &str, tool: &str, args: Value) -> Result<Value, TransportError>;
}

/// Errors from hub operations
#[derive(Debug, Error)]
pub enum HubError {
    #[error("unknown tool server: {0}")]
    UnknownServer(String),

    #[error("unknown tool '{tool}' on server '{server}'")]
    UnknownTool { server: String, tool: String },

    #[error("tool server '{0}' is not connected")]
    NotConnected(String),

    #[error(transparent)]
    Retry(#[from] RetryError),
}

/// Maintains named tool-server connections and the single tool-call path
///
/// The connection table is owned exclusively by the hub; the orchestrator and
/// callers read snapshots and issue operations.
pub struct ToolHub {
    connections: HashMap<String, ServerConnection>,
    transport: Arc<dyn ToolTransport>,
    /// Attempt budget applied to every call (per-attempt timeout comes from
    /// the connection)
    max_attempts: u32,
}

impl ToolHub {
    pub fn new(transport: Arc<dyn ToolTransport>, max_attempts: u32) -> Self {
        debug!(max_attempts, "ToolHub::new: called");
        Self {
            connections: HashMap::new(),
            transport,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Register a server, or update its timeout if already present
    ///
    /// Idempotent upsert: re-registering never duplicates a connection and
    /// never resets its status or catalog.
    pub fn register_connection(&mut self, name: impl Into<String>, timeout: Duration) {
        let name = name.into();
        debug!(%name, ?timeout, "ToolHub::register_connection: called");
        match self.connections.get_mut(&name) {
            Some(conn) => {
                conn.timeout = timeout;
            }
            None => {
                self.connections.insert(name.clone(), ServerConnection::new(name, timeout));
            }
        }
    }

    /// Transport reports a handshake in progress
    pub fn mark_connecting(&mut self, name: &str) -> Result<(), HubError> {
        self.set_status(name, ServerStatus::Connecting)
    }

    /// Transport reports a completed handshake along with the tool catalog
    pub fn mark_connected(&mut self, name: &str, tools: Vec<ToolDescriptor>) -> Result<(), HubError> {
        let conn = self.connection_mut(name)?;
        info!(%name, tool_count = tools.len(), "ToolHub: server connected");
        conn.status = ServerStatus::Connected;
        conn.tools = tools;
        Ok(())
    }

    /// Transport reports a clean teardown
    pub fn mark_disconnected(&mut self, name: &str) -> Result<(), HubError> {
        self.set_status(name, ServerStatus::Disconnected)
    }

    /// Transport reports an unrecoverable failure
    pub fn mark_error(&mut self, name: &str) -> Result<(), HubError> {
        self.set_status(name, ServerStatus::Error)
    }

    fn set_status(&mut self, name: &str, status: ServerStatus) -> Result<(), HubError> {
        let conn = self.connection_mut(name)?;
        debug!(%name, old = %conn.status, new = %status, "ToolHub: status transition");
        conn.status = status;
        Ok(())
    }

    /// Invoke a tool under the hub's retry discipline
    ///
    /// `UnknownServer`, `UnknownTool`, and `NotConnected` are checked before
    /// any attempt is made; they are never retried. The tool's own payload is
    /// returned unmodified on success.
    pub async fn call_tool(
        &self,
        name: &str,
        tool: &str,
        args: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, HubError> {
        debug!(server = %name, %tool, "ToolHub::call_tool: called");
        let conn = self
            .connections
            .get(name)
            .ok_or_else(|| HubError::UnknownServer(name.to_string()))?;

        if conn.status != ServerStatus::Connected {
            warn!(server = %name, status = %conn.status, "ToolHub::call_tool: server not connected");
            return Err(HubError::NotConnected(name.to_string()));
        }

        if !conn.has_tool(tool) {
            return Err(HubError::UnknownTool {
                server: name.to_string(),
                tool: tool.to_string(),
            });
        }

        let policy = RetryPolicy::new(self.max_attempts, conn.timeout);
        let transport = Arc::clone(&self.transport);
        let server = name.to_string();
        let tool = tool.to_string();

        let result = retry::execute_cancellable(policy, cancel, || {
            let transport = Arc::clone(&transport);
            let server = server.clone();
            let tool = tool.clone();
            let args = args.clone();
            async move { transport.call(&server, &tool, args).await }
        })
        .await?;

        Ok(result)
    }

    /// Change a server's per-attempt timeout, returning the refreshed snapshot
    ///
    /// The only mutator of a connection's timeout after registration.
    pub fn update_timeout(&mut self, name: &str, timeout: Duration) -> Result<ServerConnection, HubError> {
        debug!(%name, ?timeout, "ToolHub::update_timeout: called");
        let conn = self.connection_mut(name)?;
        conn.timeout = timeout;
        Ok(conn.clone())
    }

    /// Set a tool's trust flag (no network effect)
    pub fn toggle_always_allow(&mut self, name: &str, tool: &str, allow: bool) -> Result<(), HubError> {
        debug!(server = %name, %tool, allow, "ToolHub::toggle_always_allow: called");
        let conn = self.connection_mut(name)?;
        let descriptor = conn
            .tools
            .iter_mut()
            .find(|t| t.name == tool)
            .ok_or_else(|| HubError::UnknownTool {
                server: name.to_string(),
                tool: tool.to_string(),
            })?;
        descriptor.auto_approve = allow;
        Ok(())
    }

    /// Whether a tool may be called without user confirmation
    pub fn is_always_allowed(&self, name: &str, tool: &str) -> bool {
        self.connections
            .get(name)
            .and_then(|c| c.tool(tool))
            .map(|t| t.auto_approve)
            .unwrap_or(false)
    }

    /// Snapshot of one connection
    pub fn connection(&self, name: &str) -> Option<ServerConnection> {
        self.connections.get(name).cloned()
    }

    /// Snapshots of all connections, ordered by name
    pub fn connections(&self) -> Vec<ServerConnection> {
        let mut all: Vec<_> = self.connections.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Flattened catalog of every connected server's tools
    pub fn tool_catalog(&self) -> Vec<ToolDescriptor> {
        let mut catalog = Vec::new();
        for conn in self.connections() {
            if conn.status == ServerStatus::Connected {
                catalog.extend(conn.tools);
            }
        }
        catalog
    }

    fn connection_mut(&mut self, name: &str) -> Result<&mut ServerConnection, HubError> {
        self.connections
            .get_mut(name)
            .ok_or_else(|| HubError::UnknownServer(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport that counts calls and optionally fails the first N
    struct CountingTransport {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl CountingTransport {
        fn new(fail_first: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
            }
        }
    }

    #[async_trait]
    impl ToolTransport for CountingTransport {
        async fn call(&self, _server: &str, tool: &str, _args: Value) -> Result<Value, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                Err(TransportError::Failure(format!("flaky {}", n)))
            } else {
                Ok(json!({ "tool": tool, "attempt": n }))
            }
        }
    }

    fn hub_with(transport: Arc<CountingTransport>) -> ToolHub {
        let mut hub = ToolHub::new(transport, 3);
        hub.register_connection("files", Duration::from_secs(5));
        hub.mark_connected(
            "files",
            vec![ToolDescriptor::new("read", "Read a file", json!({"type": "object"}))],
        )
        .unwrap();
        hub
    }

    #[tokio::test]
    async fn test_call_tool_returns_payload_unmodified() {
        let transport = Arc::new(CountingTransport::new(0));
        let hub = hub_with(transport.clone());

        let out = hub
            .call_tool("files", "read", json!({"path": "a.txt"}), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out["tool"], "read");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_tool_retries_transient_failures() {
        let transport = Arc::new(CountingTransport::new(2));
        let hub = hub_with(transport.clone());

        let out = hub
            .call_tool("files", "read", json!({}), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out["attempt"], 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_tool_surfaces_exhaustion() {
        let transport = Arc::new(CountingTransport::new(u32::MAX));
        let hub = hub_with(transport.clone());

        let err = hub
            .call_tool("files", "read", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HubError::Retry(RetryError::Exhausted { attempts: 3, .. })));
    }

    #[tokio::test]
    async fn test_unknown_server_fails_without_transport_call() {
        let transport = Arc::new(CountingTransport::new(0));
        let hub = hub_with(transport.clone());

        let err = hub
            .call_tool("nope", "read", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HubError::UnknownServer(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_without_transport_call() {
        let transport = Arc::new(CountingTransport::new(0));
        let hub = hub_with(transport.clone());

        let err = hub
            .call_tool("files", "write", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HubError::UnknownTool { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disconnected_server_blocks_calls_without_transport_call() {
        let transport = Arc::new(CountingTransport::new(0));
        let mut hub = hub_with(transport.clone());
        hub.mark_disconnected("files").unwrap();

        let err = hub
            .call_tool("files", "read", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HubError::NotConnected(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);

        // Reconnect unblocks the call path.
        hub.mark_connecting("files").unwrap();
        hub.mark_connected(
            "files",
            vec![ToolDescriptor::new("read", "Read a file", json!({"type": "object"}))],
        )
        .unwrap();
        assert!(hub
            .call_tool("files", "read", json!({}), &CancellationToken::new())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_errored_server_blocks_calls() {
        let transport = Arc::new(CountingTransport::new(0));
        let mut hub = hub_with(transport);
        hub.mark_error("files").unwrap();

        let err = hub
            .call_tool("files", "read", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::NotConnected(_)));
    }

    #[test]
    fn test_register_connection_is_idempotent_upsert() {
        let transport = Arc::new(CountingTransport::new(0));
        let mut hub = hub_with(transport);

        // Re-register with a new timeout: no duplicate, status preserved.
        hub.register_connection("files", Duration::from_secs(99));

        assert_eq!(hub.connections().len(), 1);
        let conn = hub.connection("files").unwrap();
        assert_eq!(conn.timeout, Duration::from_secs(99));
        assert_eq!(conn.status, ServerStatus::Connected);
        assert!(conn.has_tool("read"));
    }

    #[test]
    fn test_update_timeout_returns_refreshed_snapshot() {
        let transport = Arc::new(CountingTransport::new(0));
        let mut hub = hub_with(transport);

        let snapshot = hub.update_timeout("files", Duration::from_secs(120)).unwrap();
        assert_eq!(snapshot.timeout, Duration::from_secs(120));

        let err = hub.update_timeout("ghost", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, HubError::UnknownServer(_)));
    }

    #[test]
    fn test_toggle_always_allow_flips_trust_flag() {
        let transport = Arc::new(CountingTransport::new(0));
        let mut hub = hub_with(transport);

        assert!(!hub.is_always_allowed("files", "read"));
        hub.toggle_always_allow("files", "read", true).unwrap();
        assert!(hub.is_always_allowed("files", "read"));
        hub.toggle_always_allow("files", "read", false).unwrap();
        assert!(!hub.is_always_allowed("files", "read"));

        let err = hub.toggle_always_allow("files", "ghost", true).unwrap_err();
        assert!(matches!(err, HubError::UnknownTool { .. }));
    }

    #[test]
    fn test_tool_catalog_only_includes_connected_servers() {
        let transport = Arc::new(CountingTransport::new(0));
        let mut hub = hub_with(transport);
        hub.register_connection("pending", Duration::from_secs(5));

        let catalog = hub.tool_catalog();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].name, "read");
    }
}
