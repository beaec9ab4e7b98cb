//! Per-backend critical sections for durable store access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per backend id.
///
/// Held around every multi-step durable store sequence so a replay's
/// purge/re-save never interleaves with a save from another flush of the same
/// backend. Different backends never contend.
#[derive(Debug, Default)]
pub struct BackendLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl BackendLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and returns the lock of `backend_id`.
    pub async fn lock(&self, backend_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(backend_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}
