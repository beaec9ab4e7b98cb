//! Event and session value types.
//!
//! Events are created by the proxy facade, mutated only to fill in a missing
//! timestamp or session id before queuing, and dropped with their batch.

mod event;
mod session;

pub use event::{Event, EventType, Properties};
pub use session::Session;
