// Shared test helpers for mock collectors and durable stores.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::path::Path;
use std::sync::Arc;

use httptest::Server;
use serde_json::Value;

use mcs_analytics::delivery::{DeliveryContext, DeliverySettings};
use mcs_analytics::initialization::init_client;
use mcs_analytics::transport::HttpTransport;
use mcs_analytics::{AnalyticsConfig, FailedBatchStore, SqliteBatchStore};

pub const BACKEND_ID: &str = "it-backend";
pub const EVENTS_PATH: &str = "/mobile/platform/analytics/events";

/// Configuration pointing at a mock collector and a database under `db_dir`.
pub fn test_config(server: &Server, db_dir: &Path) -> AnalyticsConfig {
    AnalyticsConfig {
        backend_id: BACKEND_ID.to_string(),
        base_url: format!("http://{}", server.addr()),
        application_key: "it-app-key".to_string(),
        device_id: "it-device".to_string(),
        component: "it-component".to_string(),
        db_path: db_dir.join("analytics.db"),
        timeout_seconds: 5,
        ..Default::default()
    }
}

/// Delivery context with the real HTTP transport and a SQLite store.
pub async fn sqlite_context(config: &AnalyticsConfig) -> (DeliveryContext, Arc<SqliteBatchStore>) {
    let store = Arc::new(
        SqliteBatchStore::open(&config.db_path)
            .await
            .expect("Failed to open test store"),
    );
    let client = init_client(config).expect("Failed to build HTTP client");
    let settings = DeliverySettings::from_config(config).expect("Invalid test config");
    let ctx = DeliveryContext::new(
        settings,
        Arc::new(HttpTransport::new(client)),
        store.clone(),
    );
    (ctx, store)
}

/// Stored payloads for the test backend, oldest first.
#[allow(dead_code)] // Not every test file inspects payloads
pub async fn stored_payloads(store: &SqliteBatchStore) -> Vec<String> {
    store
        .pending_messages(BACKEND_ID)
        .await
        .into_iter()
        .map(|record| record.payload)
        .collect()
}

/// Event names of a stored or sent batch, in order.
#[allow(dead_code)] // Not every test file inspects payloads
pub fn batch_names(payload: &str) -> Vec<String> {
    let batch: Vec<Value> = serde_json::from_str(payload).expect("payload is a JSON array");
    batch
        .iter()
        .map(|event| event["name"].as_str().unwrap_or_default().to_string())
        .collect()
}
