//! Event bus - pub/sub fan-out for task telemetry
//!
//! Built on tokio broadcast channels. The orchestrator emits, consumers
//! (hosts, loggers, UIs) subscribe.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::model::AskKind;
use crate::task::{Mode, Phase};

use super::types::TaskEvent;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Central event bus for task telemetry
pub struct EventBus {
    tx: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped, and a full
    /// channel drops the oldest events first.
    pub fn emit(&self, event: TaskEvent) {
        debug!(event_type = event.event_type(), task_id = event.task_id(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to receive events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter handle bound to one task
    pub fn emitter_for(&self, task_id: impl Into<String>) -> EventEmitter {
        let task_id = task_id.into();
        debug!(%task_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            task_id,
        }
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for emitting events without owning the bus
///
/// Cheap to clone; carries a pre-set task ID.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<TaskEvent>,
    task_id: String,
}

impl EventEmitter {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Emit a raw event
    pub fn emit(&self, event: TaskEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    // === Convenience methods ===

    pub fn task_started(&self, mode: Mode, model_id: &str) {
        self.emit(TaskEvent::TaskStarted {
            task_id: self.task_id.clone(),
            mode,
            model_id: model_id.to_string(),
        });
    }

    pub fn mode_changed(&self, mode: Mode, model_id: &str) {
        self.emit(TaskEvent::ModeChanged {
            task_id: self.task_id.clone(),
            mode,
            model_id: model_id.to_string(),
        });
    }

    pub fn ask_raised(&self, kind: AskKind, prompt: &str) {
        self.emit(TaskEvent::AskRaised {
            task_id: self.task_id.clone(),
            kind: format!("{:?}", kind),
            prompt: prompt.to_string(),
        });
    }

    pub fn ask_resolved(&self, kind: AskKind, approved: bool) {
        self.emit(TaskEvent::AskResolved {
            task_id: self.task_id.clone(),
            kind: format!("{:?}", kind),
            approved,
        });
    }

    pub fn tool_call_started(&self, server: &str, tool: &str) {
        self.emit(TaskEvent::ToolCallStarted {
            task_id: self.task_id.clone(),
            server: server.to_string(),
            tool: tool.to_string(),
        });
    }

    pub fn tool_call_completed(&self, server: &str, tool: &str, success: bool) {
        self.emit(TaskEvent::ToolCallCompleted {
            task_id: self.task_id.clone(),
            server: server.to_string(),
            tool: tool.to_string(),
            success,
        });
    }

    pub fn hook_cancelled(&self, hook: &str) {
        self.emit(TaskEvent::HookCancelled {
            task_id: self.task_id.clone(),
            hook: hook.to_string(),
        });
    }

    pub fn context_condensed(&self, messages_before: usize, messages_after: usize) {
        self.emit(TaskEvent::ContextCondensed {
            task_id: self.task_id.clone(),
            messages_before,
            messages_after,
        });
    }

    pub fn usage_recorded(&self, model_id: &str, provider_id: &str, mode: Mode) {
        self.emit(TaskEvent::UsageRecorded {
            task_id: self.task_id.clone(),
            model_id: model_id.to_string(),
            provider_id: provider_id.to_string(),
            mode,
        });
    }

    pub fn task_completed(&self, turns: u32) {
        self.emit(TaskEvent::TaskCompleted {
            task_id: self.task_id.clone(),
            turns,
        });
    }

    pub fn task_failed(&self, reason: &str) {
        self.emit(TaskEvent::TaskFailed {
            task_id: self.task_id.clone(),
            reason: reason.to_string(),
        });
    }

    pub fn task_cancelled(&self, phase_before: Phase) {
        self.emit(TaskEvent::TaskCancelled {
            task_id: self.task_id.clone(),
            phase_before,
        });
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_bus_starts_with_no_subscribers() {
        let bus = EventBus::new(100);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        bus.emit(TaskEvent::TaskCompleted {
            task_id: "t-1".to_string(),
            turns: 2,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.task_id(), "t-1");
        assert_eq!(event.event_type(), "TaskCompleted");
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(100);
        bus.emit(TaskEvent::TaskFailed {
            task_id: "t-1".to_string(),
            reason: "boom".to_string(),
        });
    }

    #[tokio::test]
    async fn test_emitter_binds_task_id() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("t-42");

        emitter.task_started(Mode::Plan, "model-x");
        emitter.tool_call_started("files", "read");
        emitter.tool_call_completed("files", "read", true);

        for _ in 0..3 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.task_id(), "t-42");
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let bus = EventBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(TaskEvent::TaskCompleted {
            task_id: "t".to_string(),
            turns: 1,
        });

        assert_eq!(rx1.recv().await.unwrap().task_id(), "t");
        assert_eq!(rx2.recv().await.unwrap().task_id(), "t");
    }
}
