//! Configuration for the orchestration core

use std::path::Path;
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Retry discipline applied to tool calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempt budget per call (minimum 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_per_attempt_timeout_ms")]
    pub per_attempt_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_per_attempt_timeout_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            per_attempt_timeout_ms: default_per_attempt_timeout_ms(),
        }
    }
}

/// Tool-server hub settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Timeout applied to newly registered servers, in milliseconds
    #[serde(default = "default_server_timeout_ms")]
    pub default_timeout_ms: u64,
}

fn default_server_timeout_ms() -> u64 {
    60_000
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_server_timeout_ms(),
        }
    }
}

/// Per-task defaults the orchestrator applies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefaults {
    /// Hard ceiling on model turns before the task fails
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Message count at which condensation is proposed
    #[serde(default = "default_condense_threshold")]
    pub condense_threshold: usize,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_turns() -> u32 {
    24
}

fn default_condense_threshold() -> usize {
    40
}

fn default_max_tokens() -> u32 {
    16_384
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            condense_threshold: default_condense_threshold(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Top-level core configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub task: TaskDefaults,
}

impl CoreConfig {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        let config: CoreConfig =
            serde_yaml::from_str(&content).wrap_err_with(|| format!("invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            eyre::bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.per_attempt_timeout_ms == 0 {
            eyre::bail!("retry.per_attempt_timeout_ms must be nonzero");
        }
        if self.hub.default_timeout_ms == 0 {
            eyre::bail!("hub.default_timeout_ms must be nonzero");
        }
        if self.task.max_turns == 0 {
            eyre::bail!("task.max_turns must be at least 1");
        }
        Ok(())
    }

    /// Retry policy derived from the retry section
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.per_attempt_timeout_ms),
        )
    }

    /// Default per-server timeout for the hub
    pub fn hub_timeout(&self) -> Duration {
        Duration::from_millis(self.hub.default_timeout_ms)
    }
}
