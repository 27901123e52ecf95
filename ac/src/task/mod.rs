//! Task lifecycle and orchestration

mod orchestrator;
mod settings;
mod state;

use thiserror::Error;

use crate::store::StoreError;

pub use orchestrator::{Phase, TaskHandle, TaskOrchestrator};
pub use settings::{ChatSettings, TaskConfig};
pub use state::{render_focus_chain, HookHandle, Mode, Task, TodoItem, TodoStatus};

/// Errors from task operations
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid task config: {0}")]
    InvalidConfig(String),

    #[error("chat settings are required for this operation")]
    MissingSettings,

    #[error("operation '{op}' not valid in phase {phase}")]
    StateMismatch { op: &'static str, phase: Phase },

    #[error(transparent)]
    Store(#[from] StoreError),
}
