//! Error type definitions.
//!
//! This module defines the error enums used throughout the crate and the
//! outcome categories counted by `DeliveryStats`.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Errors surfaced synchronously to callers of the analytics API.
///
/// Send-path failures never appear here: they are terminal inside the
/// background upload task and only show up in logs, stats and the durable store.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Caller misuse, e.g. an event without a name.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A single event could not be turned into its wire form.
    #[error("Event serialization error: {0}")]
    Serialization(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable store failure.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Shared resource setup failure (HTTP client, logger).
    #[error(transparent)]
    Initialization(#[from] InitializationError),
}

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Schema migration error.
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

impl DatabaseError {
    /// Whether the error is a transient lock/busy condition worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DatabaseError::SqlError(sqlx::Error::Database(db_err))
                if db_err.message().contains("database is locked")
                    || db_err.message().contains("database is busy")
        )
    }
}

/// Delivery outcomes tracked by `DeliveryStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum DeliveryOutcomeType {
    /// Batch accepted by the collector
    BatchSucceeded,
    /// Batch persisted for a later replay (recoverable failure or offline)
    BatchSavedForLater,
    /// Batch rejected as malformed and dropped
    BatchDiscarded,
    /// Session ended with no queued events
    FlushSkipped,
    /// Durable record accepted on replay
    ReplaySucceeded,
    /// Durable record failed again on replay
    ReplayFailed,
    /// Single event omitted from a batch because it could not be serialized
    EventDropped,
}

impl std::fmt::Display for DeliveryOutcomeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DeliveryOutcomeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcomeType::BatchSucceeded => "Batch succeeded",
            DeliveryOutcomeType::BatchSavedForLater => "Batch saved for later",
            DeliveryOutcomeType::BatchDiscarded => "Batch discarded",
            DeliveryOutcomeType::FlushSkipped => "Flush skipped (no events)",
            DeliveryOutcomeType::ReplaySucceeded => "Replay succeeded",
            DeliveryOutcomeType::ReplayFailed => "Replay failed",
            DeliveryOutcomeType::EventDropped => "Event dropped",
        }
    }
}
