//! Turn protocol types for the model-client seam
//!
//! Provider-agnostic request/response shapes. The core never speaks a model
//! API directly; hosts implement [`super::ModelClient`] over whatever wire
//! protocol their provider uses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hub::ToolDescriptor;
use crate::task::TodoItem;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Inline image content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    /// MIME type, e.g. "image/png"
    pub media_type: String,
    /// Base64-encoded payload
    pub data: String,
}

/// A content block in a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "image")]
    Image { source: ImageSource },

    #[serde(rename = "tool_result")]
    ToolResult {
        server: String,
        tool: String,
        content: String,
        is_error: bool,
    },
}

/// Message content - either plain text or structured blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A message in the task's conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Create a user message with multiple content blocks
    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Whether any block carries image content
    pub fn has_images(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Blocks(blocks) => blocks.iter().any(|b| matches!(b, ContentBlock::Image { .. })),
        }
    }

    /// Copy of this message with image blocks removed
    pub fn without_images(&self) -> Self {
        match &self.content {
            MessageContent::Text(_) => self.clone(),
            MessageContent::Blocks(blocks) => Self {
                role: self.role,
                content: MessageContent::Blocks(
                    blocks
                        .iter()
                        .filter(|b| !matches!(b, ContentBlock::Image { .. }))
                        .cloned()
                        .collect(),
                ),
            },
        }
    }
}

/// Everything needed for one model turn
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// System prompt, already shaped by the resolved adapter
    pub system_prompt: String,

    /// Conversation so far
    pub messages: Vec<Message>,

    /// Tool catalog available this turn (flattened from the hub)
    pub tools: Vec<ToolDescriptor>,

    /// Max tokens for the response
    pub max_tokens: u32,
}

/// A request to invoke a tool on a named server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Tool-server name (addressing key in the hub)
    pub server: String,
    /// Tool name within that server's catalog
    pub tool: String,
    /// Tool arguments
    pub args: Value,
}

/// What kind of decision an ask is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskKind {
    /// Free-form question to the user
    Question,
    /// Confirmation before a non-trusted tool call
    ToolApproval,
    /// Confirmation before condensing the context window
    CondenseConfirmation,
}

/// A request for user input raised during a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRequest {
    pub kind: AskKind,
    pub prompt: String,
}

/// The user's answer to a pending ask
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskResponse {
    Approved,
    Denied,
    Text(String),
}

/// What the model decided to do with its turn
#[derive(Debug, Clone)]
pub enum TurnAction {
    /// Task is done
    Complete,
    /// Invoke a tool and continue with its result
    UseTool(ToolCallRequest),
    /// Wait for a human decision
    Ask(AskRequest),
    /// Replace the focus chain (todo checklist)
    UpdateFocus(Vec<TodoItem>),
}

/// One model turn: optional prose plus the chosen action
#[derive(Debug, Clone)]
pub struct TurnResponse {
    pub content: Option<String>,
    pub action: TurnAction,
}
