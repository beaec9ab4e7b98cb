//! In-memory failed-batch store.
//!
//! Used by tests and by hosts that run without a database. Contents do not
//! survive the process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::models::DurableBatchRecord;
use super::store::FailedBatchStore;

#[derive(Debug, Default)]
pub struct MemoryBatchStore {
    records: Mutex<HashMap<String, Vec<DurableBatchRecord>>>,
    save_count: AtomicUsize,
}

impl MemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored for a backend.
    pub fn len(&self, backend_id: &str) -> usize {
        self.lock().get(backend_id).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, backend_id: &str) -> bool {
        self.len(backend_id) == 0
    }

    /// Total number of `save_for_later` calls since creation.
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<DurableBatchRecord>>> {
        // A panic while holding the lock leaves the map consistent, so keep going
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl FailedBatchStore for MemoryBatchStore {
    async fn save_for_later(&self, backend_id: &str, payload: &str, flattened_headers: &str) {
        self.save_count.fetch_add(1, Ordering::SeqCst);
        self.lock()
            .entry(backend_id.to_string())
            .or_default()
            .push(DurableBatchRecord::new(
                backend_id,
                payload,
                flattened_headers,
            ));
    }

    async fn pending_messages(&self, backend_id: &str) -> Vec<DurableBatchRecord> {
        self.lock().get(backend_id).cloned().unwrap_or_default()
    }

    async fn purge_all_for_backend(&self, backend_id: &str) -> bool {
        self.lock().remove(backend_id);
        true
    }
}
