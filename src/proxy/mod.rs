//! Analytics proxy facade.
//!
//! This module provides:
//! - `AnalyticsProxy`: the session and event API used by the application
//!
//! The proxy owns the in-memory event queue. Ending a session swaps the queue
//! for an empty one and hands the old contents to the backend's flush worker.

mod analytics;

pub use analytics::AnalyticsProxy;
