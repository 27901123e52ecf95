//! Task creation settings

use serde::{Deserialize, Serialize};

use crate::model::ImageSource;

use super::Mode;

/// Model selection for a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub model_id: String,
    pub provider_id: String,
    /// Max tokens per model response
    pub max_tokens: u32,
}

impl ChatSettings {
    /// Check required fields are present
    pub fn validate(&self) -> Result<(), String> {
        if self.model_id.trim().is_empty() {
            return Err("model_id must not be empty".to_string());
        }
        if self.provider_id.trim().is_empty() {
            return Err("provider_id must not be empty".to_string());
        }
        Ok(())
    }
}

/// Everything needed to start a new task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// The task prompt
    pub task: String,

    /// Initial mode
    #[serde(default)]
    pub mode: Mode,

    pub chat_settings: ChatSettings,

    /// Images attached to the initial prompt
    #[serde(default)]
    pub images: Vec<ImageSource>,
}
