//! Agentcore - Task Execution & Tool-Call Orchestration Core
//!
//! A long-lived state machine that runs an agentic task to completion:
//! model turns, user-approved tool calls dispatched under timeout/retry
//! discipline, plan/act mode switching, and auxiliary task state (focus
//! chain, usage history, hook cancellation).
//!
//! The host brings the outer surfaces: a [`model::ModelClient`] for model
//! turns, a [`hub::ToolTransport`] for raw tool calls, and a
//! [`store::MetadataStore`] for persistence. The core owns everything in
//! between.
//!
//! # Modules
//!
//! - [`task`] - Task lifecycle and the orchestration control loop
//! - [`hub`] - Tool-server connections and the retry-wrapped call path
//! - [`retry`] - Bounded retry with per-attempt timeouts
//! - [`adapter`] - Per-model behavioral quirks, resolved first-match
//! - [`model`] - Turn protocol types and the model-client seam
//! - [`usage`] - Deduplicated model usage history
//! - [`events`] - Broadcast telemetry bus
//! - [`store`] - Task metadata persistence seam
//! - [`config`] - Configuration types and YAML loading

pub mod adapter;
pub mod config;
pub mod events;
pub mod hub;
pub mod model;
pub mod retry;
pub mod store;
pub mod task;
pub mod usage;

// Re-export commonly used types
pub use adapter::{AdapterRegistry, DefaultAdapter, FenceStrippingAdapter, ModelAdapter, ReasoningModelAdapter};
pub use config::{CoreConfig, HubConfig, RetryConfig, TaskDefaults};
pub use events::{create_event_bus, EventBus, EventEmitter, TaskEvent};
pub use hub::{HubError, ServerConnection, ServerStatus, ToolDescriptor, ToolHub, ToolTransport, TransportError};
pub use model::{
    AskKind, AskRequest, AskResponse, ContentBlock, ImageSource, Message, MessageContent, ModelClient, ModelError,
    Role, ToolCallRequest, TurnAction, TurnRequest, TurnResponse,
};
pub use retry::{RetryError, RetryPolicy, RETRY_DELAY};
pub use store::{InMemoryMetadataStore, MetadataStore, StoreError, TaskMetadata};
pub use task::{
    ChatSettings, HookHandle, Mode, Phase, Task, TaskConfig, TaskError, TaskHandle, TaskOrchestrator, TodoItem,
    TodoStatus,
};
pub use usage::{UsageEntry, UsageTracker};
