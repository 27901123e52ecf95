//! Task metadata persistence seam

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::task::Mode;
use crate::usage::UsageEntry;

/// Errors from the metadata store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to load task metadata: {0}")]
    Load(String),

    #[error("failed to save task metadata: {0}")]
    Save(String),
}

/// Per-task metadata that survives the task's in-memory lifetime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Last persisted mode (restored on resume)
    #[serde(default)]
    pub mode: Mode,

    /// Chronological model usage history
    #[serde(default)]
    pub model_usage: Vec<UsageEntry>,
}

/// Storage seam for task metadata
///
/// Hosts bring their own backend; the core ships an in-memory one for tests
/// and embedded use.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Load metadata for a task, defaulting when none exists yet
    async fn load(&self, task_id: &str) -> Result<TaskMetadata, StoreError>;

    /// Persist metadata for a task
    async fn save(&self, task_id: &str, metadata: &TaskMetadata) -> Result<(), StoreError>;
}

/// In-memory metadata store
#[derive(Default)]
pub struct InMemoryMetadataStore {
    entries: Mutex<HashMap<String, TaskMetadata>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn load(&self, task_id: &str) -> Result<TaskMetadata, StoreError> {
        debug!(%task_id, "InMemoryMetadataStore::load: called");
        let entries = self.entries.lock().await;
        Ok(entries.get(task_id).cloned().unwrap_or_default())
    }

    async fn save(&self, task_id: &str, metadata: &TaskMetadata) -> Result<(), StoreError> {
        debug!(%task_id, "InMemoryMetadataStore::save: called");
        let mut entries = self.entries.lock().await;
        entries.insert(task_id.to_string(), metadata.clone());
        Ok(())
    }
}
