use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

use crate::models::{Record, SeedSummary};
use crate::store::SharedStore;

/// The fixed demo dataset, in write order
pub fn demo_records() -> Vec<Record> {
    vec![
        Record::new("1001")
            .with_field("member", json!({"firstName": "Jane", "lastName": "Doe"}))
            .with_field("eligibility", json!({"status": "active"})),
        Record::new("1002")
            .with_field("member", json!({"firstName": "John", "lastName": "Rao"}))
            .with_field("eligibility", json!({"status": "inactive"})),
    ]
}

/// Writes the demo dataset and stamps the metadata record
#[derive(Clone)]
pub struct SeedJob {
    store: SharedStore,
}

impl SeedJob {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Seed, stamping the current Unix time
    pub async fn run(&self) -> Result<SeedSummary> {
        self.run_at(Utc::now().timestamp()).await
    }

    /// Seed, stamping `freshness_ts`.
    ///
    /// Data records and the metadata record go out as one batch with the
    /// metadata last. Readers may still see them become visible in any order.
    pub async fn run_at(&self, freshness_ts: i64) -> Result<SeedSummary> {
        let mut batch = demo_records();
        let count = batch.len();
        batch.push(Record::metadata(freshness_ts));

        self.store
            .put_batch(batch)
            .await
            .context("Failed to write seed batch")?;

        tracing::info!("Seeded {} records, freshness_ts: {}", count, freshness_ts);
        Ok(SeedSummary { ok: true, count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::tests::FailingStore;
    use crate::store::{MemoryStore, RecordStore};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Memory store that records every batch it receives
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        batches: Mutex<Vec<Vec<Record>>>,
    }

    #[async_trait]
    impl RecordStore for RecordingStore {
        async fn get(&self, record_id: &str) -> Result<Option<Record>> {
            self.inner.get(record_id).await
        }

        async fn put_batch(&self, records: Vec<Record>) -> Result<()> {
            self.batches.lock().unwrap().push(records.clone());
            self.inner.put_batch(records).await
        }
    }

    #[tokio::test]
    async fn test_seed_writes_one_batch_with_metadata_last() {
        let store = Arc::new(RecordingStore::default());
        let summary = SeedJob::new(store.clone()).run_at(1_700_000_000).await.unwrap();

        assert_eq!(summary, SeedSummary { ok: true, count: 2 });

        let batches = store.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let ids: Vec<&str> = batches[0].iter().filter_map(Record::record_id).collect();
        assert_eq!(ids, vec!["1001", "1002", "__meta__"]);
        assert_eq!(batches[0][2].freshness_ts().unwrap(), Some(1_700_000_000));
    }

    #[tokio::test]
    async fn test_seed_stamps_current_time() {
        let store = Arc::new(MemoryStore::new());
        let started = Utc::now().timestamp();

        SeedJob::new(store.clone()).run().await.unwrap();

        assert_eq!(store.len().await, 3);
        let meta = store.get("__meta__").await.unwrap().unwrap();
        let freshness_ts = meta.freshness_ts().unwrap().unwrap();
        assert!(freshness_ts >= started);
        assert!(freshness_ts <= Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_seed_twice_is_idempotent_for_data() {
        let store = Arc::new(MemoryStore::new());
        let job = SeedJob::new(store.clone());

        job.run_at(100).await.unwrap();
        let first = serde_json::to_string(&store.get("1001").await.unwrap()).unwrap();
        job.run_at(200).await.unwrap();

        assert_eq!(store.len().await, 3);
        assert_eq!(
            serde_json::to_string(&store.get("1001").await.unwrap()).unwrap(),
            first
        );
        assert_eq!(
            serde_json::to_string(&store.get("1002").await.unwrap()).unwrap(),
            serde_json::to_string(&Some(demo_records()[1].clone())).unwrap()
        );
        let meta = store.get("__meta__").await.unwrap().unwrap();
        assert_eq!(meta.freshness_ts().unwrap(), Some(200));
    }

    #[tokio::test]
    async fn test_seed_propagates_store_fault() {
        let err = SeedJob::new(Arc::new(FailingStore::default()))
            .run()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to write seed batch"));
    }
}
