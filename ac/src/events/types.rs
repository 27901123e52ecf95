//! Event type definitions for task telemetry

use serde::{Deserialize, Serialize};

use crate::task::{Mode, Phase};

/// Telemetry event emitted by the orchestrator
///
/// Events are observational only; no core state transition depends on a
/// subscriber being present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was created and entered Running
    TaskStarted {
        task_id: String,
        mode: Mode,
        model_id: String,
    },

    /// Mode was toggled while a task was live
    ModeChanged {
        task_id: String,
        mode: Mode,
        model_id: String,
    },

    /// The orchestrator is blocked on a user decision
    AskRaised { task_id: String, kind: String, prompt: String },

    /// A pending ask was answered
    AskResolved { task_id: String, kind: String, approved: bool },

    /// A tool call was dispatched to the hub
    ToolCallStarted {
        task_id: String,
        server: String,
        tool: String,
    },

    /// A tool call returned (success or error result)
    ToolCallCompleted {
        task_id: String,
        server: String,
        tool: String,
        success: bool,
    },

    /// A registered hook was cancelled
    HookCancelled { task_id: String, hook: String },

    /// The conversation was condensed
    ContextCondensed {
        task_id: String,
        messages_before: usize,
        messages_after: usize,
    },

    /// A usage entry was appended
    UsageRecorded {
        task_id: String,
        model_id: String,
        provider_id: String,
        mode: Mode,
    },

    /// Terminal: the model declared the task done
    TaskCompleted { task_id: String, turns: u32 },

    /// Terminal: unrecoverable failure
    TaskFailed { task_id: String, reason: String },

    /// Terminal: cancelled by the user
    TaskCancelled { task_id: String, phase_before: Phase },
}

impl TaskEvent {
    /// Event type name for logging and filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskStarted { .. } => "TaskStarted",
            Self::ModeChanged { .. } => "ModeChanged",
            Self::AskRaised { .. } => "AskRaised",
            Self::AskResolved { .. } => "AskResolved",
            Self::ToolCallStarted { .. } => "ToolCallStarted",
            Self::ToolCallCompleted { .. } => "ToolCallCompleted",
            Self::HookCancelled { .. } => "HookCancelled",
            Self::ContextCondensed { .. } => "ContextCondensed",
            Self::UsageRecorded { .. } => "UsageRecorded",
            Self::TaskCompleted { .. } => "TaskCompleted",
            Self::TaskFailed { .. } => "TaskFailed",
            Self::TaskCancelled { .. } => "TaskCancelled",
        }
    }

    /// ID of the task the event belongs to
    pub fn task_id(&self) -> &str {
        match self {
            Self::TaskStarted { task_id, .. }
            | Self::ModeChanged { task_id, .. }
            | Self::AskRaised { task_id, .. }
            | Self::AskResolved { task_id, .. }
            | Self::ToolCallStarted { task_id, .. }
            | Self::ToolCallCompleted { task_id, .. }
            | Self::HookCancelled { task_id, .. }
            | Self::ContextCondensed { task_id, .. }
            | Self::UsageRecorded { task_id, .. }
            | Self::TaskCompleted { task_id, .. }
            | Self::TaskFailed { task_id, .. }
            | Self::TaskCancelled { task_id, .. } => task_id,
        }
    }
}
