//! Database connection pool management.
//!
//! This module initializes and configures the SQLite connection pool with:
//! - WAL mode enabled for concurrent access
//! - Automatic database file creation

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, error};
use sqlx::SqlitePool;

use crate::error_handling::DatabaseError;

/// Initializes and returns a database connection pool for `db_path`.
///
/// Creates the database file (and missing parent directories) if it doesn't
/// exist and enables WAL mode so the replay path and a concurrent save do not
/// block each other on reads.
pub async fn init_db_pool_with_path(db_path: &Path) -> Result<SqlitePool, DatabaseError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                error!("Failed to create database directory {}: {e}", parent.display());
                DatabaseError::FileCreationError(e.to_string())
            })?;
        }
    }

    let db_path_str = db_path.to_string_lossy().to_string();
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(&db_path_str)
    {
        Ok(_) => debug!("Database file {} created.", db_path_str),
        Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!("Database file {} already exists.", db_path_str)
        }
        Err(e) => {
            error!("Failed to create database file: {e}");
            return Err(DatabaseError::FileCreationError(e.to_string()));
        }
    }

    let pool = SqlitePool::connect(&format!("sqlite:{}", db_path_str))
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {e}");
            DatabaseError::SqlError(e)
        })?;

    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&pool)
        .await
        .map_err(|e| {
            error!("Failed to set WAL mode: {e}");
            DatabaseError::SqlError(e)
        })?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_db_pool_creates_file_and_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("analytics.db");
        let pool = init_db_pool_with_path(&path).await.unwrap();
        assert!(path.exists());

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_init_db_pool_reuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analytics.db");
        let first = init_db_pool_with_path(&path).await.unwrap();
        first.close().await;
        assert!(init_db_pool_with_path(&path).await.is_ok());
    }
}
