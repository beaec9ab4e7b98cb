//! Configuration constants.
//!
//! Limits and operational parameters for event collection and delivery.

/// Relative path of the analytics event collector on the mobile backend
pub const ANALYTICS_EVENTS_PATH: &str = "mobile/platform/analytics/events";

/// Status code the collector answers with when a batch is accepted.
/// Deployments that use another code override it via `AnalyticsConfig::accepted_status`.
pub const ACCEPTED_STATUS: u16 = 202;
/// Client error: the batch payload is malformed
pub const HTTP_STATUS_BAD_REQUEST: u16 = 400;
/// Client error: the collector does not accept this method
pub const HTTP_STATUS_METHOD_NOT_ALLOWED: u16 = 405;

// Event field limits
/// Maximum event name length in characters
pub const MAX_EVENT_NAME_LENGTH: usize = 100;
/// Maximum property key length in characters
pub const MAX_PROPERTY_KEY_LENGTH: usize = 500;
/// Maximum property value length in characters
pub const MAX_PROPERTY_VALUE_LENGTH: usize = 1000;

// Retry limits (extra attempts made by the transport after the first one)
/// Retry limit for the live send of a freshly composed batch
pub const PRIMARY_SEND_RETRY_LIMIT: usize = 1;
/// Retry limit for replays of durably stored batches
pub const REPLAY_SEND_RETRY_LIMIT: usize = 0;
/// Initial delay in milliseconds before a transport-level retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
/// Factor by which the retry delay is multiplied on each attempt
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between transport-level retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 15;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Upper bound for a single device location lookup
pub const LOCATION_LOOKUP_TIMEOUT_SECS: u64 = 10;
/// Pending flushes allowed per backend before `end_session` waits for room
pub const FLUSH_QUEUE_CAPACITY: usize = 32;

/// Default SQLite database path for failed batches
pub const DB_PATH: &str = "./mcs_analytics.db";

/// Maximum number of payload characters echoed into error logs
pub const MAX_LOGGED_PAYLOAD_CHARS: usize = 4000;
