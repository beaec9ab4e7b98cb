//! Analytics configuration and constants.
//!
//! This module provides:
//! - Configuration constants (field limits, retry limits, timeouts)
//! - HTTP header name constants for the analytics collector
//! - The library configuration struct and logging option types

mod constants;
mod headers;
mod types;

// Re-export all constants
pub use constants::*;
pub use headers::*;
pub use types::{AnalyticsConfig, LogFormat, LogLevel};
