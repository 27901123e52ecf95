//! ModelClient trait definition

use async_trait::async_trait;
use thiserror::Error;

use super::{TurnRequest, TurnResponse};

/// Errors from a model turn
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("model request cancelled")]
    Cancelled,
}

/// Opaque capability provider for model turns
///
/// Each call is independent; the core owns the conversation state and sends
/// the full message history every turn. Implementations live in the host.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one turn against the model
    async fn complete(&self, request: TurnRequest) -> Result<TurnResponse, ModelError>;
}
