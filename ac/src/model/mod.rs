//! Model-client seam
//!
//! Turn protocol types plus the [`ModelClient`] trait the host implements.

mod client;
mod types;

pub use client::{ModelClient, ModelError};
#[cfg(test)]
pub use client::mock;
pub use types::{
    AskKind, AskRequest, AskResponse, ContentBlock, ImageSource, Message, MessageContent, Role, ToolCallRequest,
    TurnAction, TurnRequest, TurnResponse,
};
