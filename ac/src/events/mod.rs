//! Task telemetry events
//!
//! Broadcast-based pub/sub; emission never blocks orchestration.

mod bus;
mod types;

pub use bus::{create_event_bus, EventBus, EventEmitter, DEFAULT_CHANNEL_CAPACITY};
pub use types::TaskEvent;
