use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{Config, StoreBackend};
use crate::models::Record;
use crate::spanner::SpannerStore;

/// Key-value storage for records, keyed by `record_id`.
///
/// Consistency: reads see earlier writes to the same key. `put_batch` is
/// per-item with no cross-item atomicity, so a concurrent reader may see
/// any subset of a batch while it is being applied.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the record stored under `record_id`
    async fn get(&self, record_id: &str) -> Result<Option<Record>>;

    /// Insert or overwrite each record, in order
    async fn put_batch(&self, records: Vec<Record>) -> Result<()>;
}

/// Store handle shared by every invocation in a process
pub type SharedStore = Arc<dyn RecordStore>;

/// Build the configured store backend
pub async fn connect(config: &Config) -> Result<SharedStore> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory record store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Spanner => {
            let spanner = config
                .spanner
                .as_ref()
                .context("Spanner backend selected without Spanner settings")?;
            let store = SpannerStore::from_config(spanner, &config.table_name).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Process-local store for development and tests
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, record_id: &str) -> Result<Option<Record>> {
        Ok(self.records.read().await.get(record_id).cloned())
    }

    async fn put_batch(&self, records: Vec<Record>) -> Result<()> {
        for record in records {
            let record_id = record
                .record_id()
                .context("Cannot store a record without a string record_id")?
                .to_string();
            // One lock acquisition per item: readers may interleave mid-batch
            self.records.write().await.insert(record_id, record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_put_and_get() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);

        let record = Record::new("1001")
            .with_field("member", json!({"lastName": "Doe", "firstName": "Jane"}))
            .with_field("eligibility", json!({"status": "active"}));
        store.put_batch(vec![record.clone()]).await.unwrap();

        let fetched = store.get("1001").await.unwrap().unwrap();
        assert_eq!(
            serde_json::to_string(&fetched).unwrap(),
            serde_json::to_string(&record).unwrap()
        );
        assert_eq!(store.get("1002").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_overwrites() {
        let store = MemoryStore::new();
        store.put_batch(vec![Record::metadata(10)]).await.unwrap();
        store.put_batch(vec![Record::metadata(20)]).await.unwrap();

        assert_eq!(store.len().await, 1);
        let meta = store.get("__meta__").await.unwrap().unwrap();
        assert_eq!(meta.freshness_ts().unwrap(), Some(20));
    }

    #[tokio::test]
    async fn test_memory_store_rejects_record_without_id() {
        let store = MemoryStore::new();
        let bad: Record = serde_json::from_value(json!({"member": {}})).unwrap();

        let result = store.put_batch(vec![Record::new("1001"), bad]).await;
        assert!(result.is_err());
        // Items before the bad one were already applied
        assert!(store.get("1001").await.unwrap().is_some());
    }

    #[test]
    fn test_memory_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MemoryStore>();
    }
}
