use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::kv::{Key, KeyValueStore, KvEntry, KvResult, ListOptions};

/// In-process store used when no database is configured. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &Key) -> KvResult<Option<Value>> {
        Ok(self.entries.read().await.get(&key.render()).cloned())
    }

    async fn set(&self, key: &Key, value: Value) -> KvResult<()> {
        self.entries.write().await.insert(key.render(), value);
        Ok(())
    }

    async fn delete(&self, key: &Key) -> KvResult<()> {
        self.entries.write().await.remove(&key.render());
        Ok(())
    }

    async fn list(&self, prefix: &Key, options: ListOptions) -> KvResult<Vec<KvEntry>> {
        let prefix = prefix.list_prefix();
        let entries = self.entries.read().await;
        let matching = entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| KvEntry {
                key: key.clone(),
                value: value.clone(),
            });

        let limit = options.limit.unwrap_or(usize::MAX);
        let listed = if options.reverse {
            let mut all: Vec<KvEntry> = matching.collect();
            all.reverse();
            all.truncate(limit);
            all
        } else {
            matching.take(limit).collect()
        };

        Ok(listed)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
