//! mcs_analytics library: mobile analytics batching and durable delivery
//!
//! This library queues analytics events per session, uploads each ended
//! session as one JSON batch to a mobile backend's analytics collector, and
//! keeps batches that failed for a transient reason in a local SQLite store
//! until the next accepted upload replays them.
//!
//! # Example
//!
//! ```no_run
//! use mcs_analytics::{AnalyticsConfig, AnalyticsProxy, Properties};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AnalyticsConfig {
//!     backend_id: "my-backend".to_string(),
//!     base_url: "https://mcs.example.com".to_string(),
//!     application_key: "app-key".to_string(),
//!     ..Default::default()
//! };
//!
//! let proxy = AnalyticsProxy::from_config(&config).await?;
//! proxy.log_event("screen_view", Some(Properties::new().insert("screen", "home")))?;
//! if let Some(flush) = proxy.end_session().await {
//!     println!("flush finished: {:?}", flush.wait().await);
//! }
//! proxy.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Flushes run on background tasks
//! spawned onto the current runtime.

pub mod batch;
pub mod config;
pub mod delivery;
pub mod error_handling;
pub mod initialization;
pub mod model;
pub mod proxy;
pub mod storage;
pub mod transport;

// Re-export public API
pub use config::{AnalyticsConfig, LogFormat, LogLevel};
pub use delivery::{FlushHandle, FlushOutcome, ReplayReport};
pub use error_handling::{AnalyticsError, DeliveryOutcomeType, DeliveryStats, SendOutcome};
pub use model::{Event, EventType, Properties, Session};
pub use proxy::AnalyticsProxy;
pub use storage::{FailedBatchStore, MemoryBatchStore, SqliteBatchStore};
