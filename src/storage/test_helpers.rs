//! Shared test helpers for storage tests.

#[cfg(test)]
use sqlx::sqlite::SqlitePoolOptions;
#[cfg(test)]
use sqlx::SqlitePool;

#[cfg(test)]
use crate::storage::run_migrations;

/// Creates an in-memory test database pool with migrations applied.
///
/// Limited to one connection: every new connection to `sqlite::memory:`
/// would otherwise open its own empty database.
#[cfg(test)]
pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Counts stored records for a backend with a direct query.
#[cfg(test)]
pub async fn count_records(pool: &SqlitePool, backend_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM failed_batches WHERE backend_id = ?")
        .bind(backend_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count records")
}
