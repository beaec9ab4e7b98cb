//! Configuration types.
//!
//! This module defines the library configuration and the logging option enums
//! shared with the command-line binary.

use std::path::PathBuf;

use clap::ValueEnum;
use url::Url;

use crate::config::constants::{
    ACCEPTED_STATUS, ANALYTICS_EVENTS_PATH, DB_PATH, DEFAULT_TIMEOUT_SECS, FLUSH_QUEUE_CAPACITY,
};
use crate::error_handling::AnalyticsError;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: One JSON object per line for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Library configuration for the analytics pipeline.
///
/// Constructed programmatically; the binary fills it from command-line flags
/// and environment variables.
///
/// # Examples
///
/// ```no_run
/// use mcs_analytics::AnalyticsConfig;
///
/// let config = AnalyticsConfig {
///     backend_id: "a1b2c3".to_string(),
///     base_url: "https://mcs.example.com".to_string(),
///     application_key: "app-key".to_string(),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Whether analytics collection is enabled at all
    pub enabled: bool,

    /// Mobile backend identifier (also keys the durable store)
    pub backend_id: String,

    /// Base URL of the mobile backend
    pub base_url: String,

    /// Application key registered with the backend
    pub application_key: String,

    /// Device identifier sent with every batch
    pub device_id: String,

    /// Application/feature identifier stamped on session and custom events
    pub component: String,

    /// SQLite database holding batches that failed to send
    pub db_path: PathBuf,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Status code that marks a batch as accepted
    pub accepted_status: u16,

    /// Pending flushes allowed per backend queue
    pub flush_queue_capacity: usize,

    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend_id: String::new(),
            base_url: "http://localhost:7201".to_string(),
            application_key: String::new(),
            device_id: uuid::Uuid::new_v4().to_string(),
            component: "mobile-app".to_string(),
            db_path: PathBuf::from(DB_PATH),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            accepted_status: ACCEPTED_STATUS,
            flush_queue_capacity: FLUSH_QUEUE_CAPACITY,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}

impl AnalyticsConfig {
    /// Checks the settings the pipeline cannot work without.
    ///
    /// A disabled configuration is always valid since nothing is ever sent.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Config` if the backend id is empty, the base URL
    /// does not parse, or the flush queue capacity is zero.
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if !self.enabled {
            return Ok(());
        }
        if self.backend_id.trim().is_empty() {
            return Err(AnalyticsError::Config(
                "backend_id must not be empty".to_string(),
            ));
        }
        if self.flush_queue_capacity == 0 {
            return Err(AnalyticsError::Config(
                "flush_queue_capacity must be at least 1".to_string(),
            ));
        }
        self.events_url().map(|_| ())
    }

    /// Full URL of the analytics event collector.
    pub fn events_url(&self) -> Result<Url, AnalyticsError> {
        let mut base = Url::parse(&self.base_url)
            .map_err(|e| AnalyticsError::Config(format!("invalid base_url {}: {e}", self.base_url)))?;
        // Url::join drops the last path segment unless the base ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(ANALYTICS_EVENTS_PATH)
            .map_err(|e| AnalyticsError::Config(format!("invalid events URL: {e}")))
    }
}
