//! Error handling and delivery statistics.
//!
//! This module provides:
//! - Error type definitions
//! - Send outcome classification (success / recoverable / non-recoverable)
//! - Transport retry strategy configuration
//! - Delivery statistics tracking

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{
    classify_error_message, classify_send_result, classify_status, classify_transport_error,
    get_retry_strategy, SendOutcome,
};
pub use stats::DeliveryStats;
pub use types::{AnalyticsError, DatabaseError, DeliveryOutcomeType, InitializationError};
