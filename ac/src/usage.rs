//! Model usage tracking

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{MetadataStore, StoreError};
use crate::task::Mode;

/// One model usage record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    /// Unix milliseconds when recorded
    pub ts: i64,
    pub model_id: String,
    pub provider_id: String,
    pub mode: Mode,
}

impl UsageEntry {
    /// Same model, provider, and mode (timestamp ignored)
    fn same_usage(&self, other: &UsageEntry) -> bool {
        self.model_id == other.model_id && self.provider_id == other.provider_id && self.mode == other.mode
    }
}

/// Appends usage entries to a task's metadata, deduplicating consecutive
/// identical records
pub struct UsageTracker {
    store: Arc<dyn MetadataStore>,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Record model usage for a task
    ///
    /// Skipped (returns false) only when the immediately preceding entry has
    /// the same model, provider, and mode. An older matching entry deeper in
    /// the history does not suppress the append.
    pub async fn record(
        &self,
        task_id: &str,
        model_id: &str,
        provider_id: &str,
        mode: Mode,
    ) -> Result<bool, StoreError> {
        debug!(%task_id, %model_id, %provider_id, %mode, "UsageTracker::record: called");
        let entry = UsageEntry {
            ts: Utc::now().timestamp_millis(),
            model_id: model_id.to_string(),
            provider_id: provider_id.to_string(),
            mode,
        };

        let mut meta = self.store.load(task_id).await?;
        if let Some(last) = meta.model_usage.last() {
            if last.same_usage(&entry) {
                debug!(%task_id, "UsageTracker::record: duplicate of last entry, skipped");
                return Ok(false);
            }
        }

        meta.model_usage.push(entry);
        self.store.save(task_id, &meta).await?;
        Ok(true)
    }

    /// Full usage history for a task, oldest first
    pub async fn usage(&self, task_id: &str) -> Result<Vec<UsageEntry>, StoreError> {
        Ok(self.store.load(task_id).await?.model_usage)
    }
}
