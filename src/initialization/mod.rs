//! Shared resource initialization.
//!
//! This module provides:
//! - Logger setup (plain colored or JSON lines)
//! - The shared HTTP client used by `HttpTransport`
//!
//! All initialization functions return `InitializationError` on failure.

mod client;
mod logger;

// Re-export public API
pub use client::{init_client, user_agent};
pub use logger::init_logger_with;
