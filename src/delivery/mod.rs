//! Batch delivery.
//!
//! This module provides:
//! - `UploadTask`: the per-flush state machine (compose, send, settle)
//! - `retry_durable_batches`: replay of batches kept in the durable store
//! - `FlushDispatcher`: one bounded queue and worker per backend
//! - `DeliveryContext`: collaborators shared by all flushes of a proxy
//! - `BackendLocks`: per-backend critical sections around store access

mod context;
mod dispatcher;
mod locks;
mod orchestrator;
mod replay;

pub use context::{build_headers, DeliveryContext, DeliverySettings};
pub use dispatcher::{FlushDispatcher, FlushHandle};
pub use locks::BackendLocks;
pub use orchestrator::{FlushOutcome, UploadState, UploadTask};
pub use replay::{retry_durable_batches, ReplayReport};
