//! Tool-server hub
//!
//! Named connections, status tracking, and the single retry-wrapped call path
//! for all external tool invocations.

mod connection;
#[allow(clippy::module_inception)]
mod hub;

pub use connection::{ServerConnection, ServerStatus, ToolDescriptor};
pub use hub::{HubError, ToolHub, ToolTransport, TransportError};
