use std::sync::Arc;

use vidrelay_core::constants::{DEFAULT_HISTORY_LIMIT, HISTORY_PREFIX};
use vidrelay_core::models::HistoryEntry;
use vidrelay_core::AppError;

use crate::kv::{set_json, Key, KeyValueStore, ListOptions};

/// Append-only record of completed uploads, keyed by completion timestamp
/// (`history/<ts>`). Two entries with the same timestamp overwrite each other.
#[derive(Clone)]
pub struct HistoryLedger {
    store: Arc<dyn KeyValueStore>,
    list_limit: usize,
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_limit(store, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(store: Arc<dyn KeyValueStore>, list_limit: usize) -> Self {
        Self {
            store,
            list_limit: list_limit.max(1),
        }
    }

    fn prefix() -> Result<Key, AppError> {
        Ok(Key::new([HISTORY_PREFIX])?)
    }

    fn key(ts: i64) -> Result<Key, AppError> {
        if ts < 0 {
            return Err(AppError::InvalidInput(format!(
                "History timestamp must be non-negative, got {}",
                ts
            )));
        }
        Ok(Self::prefix()?.child(ts)?)
    }

    pub async fn append(&self, entry: &HistoryEntry) -> Result<(), AppError> {
        let key = Self::key(entry.ts)?;
        set_json(self.store.as_ref(), &key, entry).await?;
        tracing::debug!(ts = entry.ts, filename = %entry.filename, "History entry appended");
        Ok(())
    }

    /// Most recent entries first, at most the configured limit
    pub async fn list(&self) -> Result<Vec<HistoryEntry>, AppError> {
        let entries = self
            .store
            .list(&Self::prefix()?, ListOptions::newest_first(self.list_limit))
            .await?;

        let mut history = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry.decode::<HistoryEntry>() {
                Ok(item) => history.push(item),
                Err(e) => {
                    tracing::warn!(key = %entry.key, error = %e, "Skipping unreadable history entry");
                }
            }
        }
        Ok(history)
    }

    /// Remove the entry for `ts`. Removing a missing entry succeeds.
    pub async fn delete(&self, ts: i64) -> Result<(), AppError> {
        let key = Self::key(ts)?;
        self.store.delete(&key).await?;
        Ok(())
    }
}
