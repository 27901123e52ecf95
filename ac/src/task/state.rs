//! In-memory task state

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::model::Message;

use super::ChatSettings;

/// Operating mode for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Read-oriented planning
    #[default]
    Plan,
    /// Full execution
    Act,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plan => write!(f, "plan"),
            Self::Act => write!(f, "act"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plan" => Ok(Self::Plan),
            "act" => Ok(Self::Act),
            other => Err(format!("invalid mode: {}", other)),
        }
    }
}

/// Status of one focus-chain item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// One item in the task's focus chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    #[serde(default)]
    pub status: TodoStatus,
}

impl TodoItem {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: TodoStatus::Pending,
        }
    }
}

/// Render a focus chain as a markdown checklist
pub fn render_focus_chain(items: &[TodoItem]) -> String {
    items
        .iter()
        .map(|item| {
            let marker = match item.status {
                TodoStatus::Pending => "[ ]",
                TodoStatus::InProgress => "[-]",
                TodoStatus::Completed => "[x]",
            };
            format!("- {} {}", marker, item.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A cancellable side operation registered against a task
#[derive(Debug, Clone)]
pub struct HookHandle {
    pub name: String,
    pub token: CancellationToken,
}

/// Live state of one task
///
/// Owned by the orchestrator; external observers get clones.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub mode: Mode,
    pub settings: ChatSettings,
    /// Full conversation, oldest first
    pub messages: Vec<Message>,
    pub focus_chain: Vec<TodoItem>,
    /// Most recently registered hook, if any
    pub hook: Option<HookHandle>,
    /// Root cancellation token for the task; hooks get child tokens
    pub cancel: CancellationToken,
    /// Model turns consumed so far
    pub turns: u32,
}

impl Task {
    pub fn new(id: impl Into<String>, mode: Mode, settings: ChatSettings) -> Self {
        Self {
            id: id.into(),
            mode,
            settings,
            messages: Vec::new(),
            focus_chain: Vec::new(),
            hook: None,
            cancel: CancellationToken::new(),
            turns: 0,
        }
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace the focus chain and surface the rendered checklist to the model
    pub fn set_focus_chain(&mut self, items: Vec<TodoItem>) {
        let rendered = render_focus_chain(&items);
        self.focus_chain = items;
        if !rendered.is_empty() {
            self.messages
                .push(Message::user(format!("Current focus:\n{}", rendered)));
        }
    }
}
