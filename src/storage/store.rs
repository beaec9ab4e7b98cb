//! Durable failed-batch store.
//!
//! The store never fails observably to its callers: there is nothing more
//! durable to fall back to, so errors are logged and the operation reports an
//! empty or negative result instead.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::migrations::run_migrations;
use super::models::DurableBatchRecord;
use super::pool::init_db_pool_with_path;
use crate::error_handling::DatabaseError;

/// Per-backend collection of batches waiting for a replay.
///
/// Callers that combine operations (fetch, purge, re-save) must hold the
/// backend's lock from `BackendLocks` for the whole sequence.
#[async_trait]
pub trait FailedBatchStore: Send + Sync {
    /// Appends a record. Failures are logged, never returned.
    async fn save_for_later(&self, backend_id: &str, payload: &str, flattened_headers: &str);

    /// All records for `backend_id`, oldest first. Empty on read failure.
    async fn pending_messages(&self, backend_id: &str) -> Vec<DurableBatchRecord>;

    /// Deletes every record for `backend_id`; `true` if the delete went through.
    async fn purge_all_for_backend(&self, backend_id: &str) -> bool;
}

/// SQLite-backed store (table `failed_batches`).
#[derive(Clone)]
pub struct SqliteBatchStore {
    pool: SqlitePool,
}

impl SqliteBatchStore {
    /// Opens (creating if needed) the database at `db_path` and applies migrations.
    pub async fn open(db_path: &Path) -> Result<Self, DatabaseError> {
        let pool = init_db_pool_with_path(db_path).await?;
        run_migrations(&pool).await?;
        Ok(SqliteBatchStore { pool })
    }

    /// Wraps an existing pool. Migrations must already have run.
    pub fn from_pool(pool: SqlitePool) -> Self {
        SqliteBatchStore { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts a record, retrying transient lock/busy errors.
    ///
    /// Retries up to 3 times with exponential backoff (50ms, 100ms, 200ms).
    pub async fn insert_record(
        &self,
        backend_id: &str,
        payload: &str,
        flattened_headers: &str,
    ) -> Result<i64, DatabaseError> {
        const MAX_RETRIES: usize = 3;
        const INITIAL_DELAY_MS: u64 = 50;

        let mut attempt = 0;
        loop {
            match self
                .insert_record_impl(backend_id, payload, flattened_headers)
                .await
            {
                Ok(id) => return Ok(id),
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    let delay_ms = INITIAL_DELAY_MS * (1 << attempt);
                    log::debug!("Durable store busy, retrying insert in {delay_ms}ms");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn insert_record_impl(
        &self,
        backend_id: &str,
        payload: &str,
        flattened_headers: &str,
    ) -> Result<i64, DatabaseError> {
        let id = sqlx::query(
            "INSERT INTO failed_batches (backend_id, payload, headers, created_at_ms)
            VALUES (?, ?, ?, ?)
            RETURNING id",
        )
        .bind(backend_id)
        .bind(payload)
        .bind(flattened_headers)
        .bind(chrono::Utc::now().timestamp_millis())
        .fetch_one(&self.pool)
        .await?
        .get::<i64, _>(0);
        Ok(id)
    }

    /// Reads all records for a backend in insertion order.
    pub async fn fetch_records(
        &self,
        backend_id: &str,
    ) -> Result<Vec<DurableBatchRecord>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT backend_id, payload, headers FROM failed_batches
            WHERE backend_id = ?
            ORDER BY id",
        )
        .bind(backend_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DurableBatchRecord {
                backend_id: row.get("backend_id"),
                payload: row.get("payload"),
                headers: row.get("headers"),
            })
            .collect())
    }

    /// Deletes all records for a backend and returns how many were removed.
    pub async fn delete_backend(&self, backend_id: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM failed_batches WHERE backend_id = ?")
            .bind(backend_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FailedBatchStore for SqliteBatchStore {
    async fn save_for_later(&self, backend_id: &str, payload: &str, flattened_headers: &str) {
        match self
            .insert_record(backend_id, payload, flattened_headers)
            .await
        {
            Ok(id) => log::debug!("Saved batch {id} for backend {backend_id} for later"),
            Err(e) => log::error!(
                "Durable store: failed to save batch for backend {backend_id}, batch lost: {e}"
            ),
        }
    }

    async fn pending_messages(&self, backend_id: &str) -> Vec<DurableBatchRecord> {
        self.fetch_records(backend_id).await.unwrap_or_else(|e| {
            log::error!("Durable store: failed to read batches for backend {backend_id}: {e}");
            Vec::new()
        })
    }

    async fn purge_all_for_backend(&self, backend_id: &str) -> bool {
        match self.delete_backend(backend_id).await {
            Ok(removed) => {
                log::debug!("Purged {removed} stored batch(es) for backend {backend_id}");
                true
            }
            Err(e) => {
                log::error!("Durable store: failed to purge backend {backend_id}: {e}");
                false
            }
        }
    }
}
