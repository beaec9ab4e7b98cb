//! Upload orchestrator.
//!
//! One `UploadTask` per flush. It composes the session's batch, sends it once
//! (with a single transport-level retry), and settles the batch into exactly
//! one terminal state:
//!
//! - accepted: the queue is dropped and stored batches are replayed
//! - rejected as malformed (400/405): the batch is logged and discarded
//! - anything else, or offline: the batch is saved to the durable store
//!
//! Nothing is reported back to the code that ended the session beyond the
//! returned `FlushOutcome`, which the dispatcher hands to an optional waiter.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;

use super::context::DeliveryContext;
use super::replay::{retry_durable_batches, ReplayReport};
use crate::batch::{compose_batch, ContextInfo};
use crate::config::{MAX_LOGGED_PAYLOAD_CHARS, PRIMARY_SEND_RETRY_LIMIT};
use crate::error_handling::{classify_send_result, DeliveryOutcomeType, SendOutcome};
use crate::model::{Event, Session};
use crate::storage::flatten_headers;
use crate::transport::{TransportError, TransportRequest, TransportResponse};

/// Upload states. Every run ends back in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Composing,
    Sending,
    Succeeded,
    RecoverableFailed,
    NonRecoverableFailed,
}

/// Terminal result of one flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The session had no events; nothing was composed or sent.
    Skipped,
    /// The collector accepted the batch. `replay` describes the piggybacked
    /// replay of stored batches.
    Succeeded { replay: ReplayReport },
    /// The collector rejected the batch; its events are gone.
    Discarded,
    /// The batch went to the durable store (send failed or device offline).
    SavedForLater,
}

impl FlushOutcome {
    /// The state the upload passed through before returning to idle.
    pub fn terminal_state(&self) -> UploadState {
        match self {
            FlushOutcome::Skipped => UploadState::Idle,
            FlushOutcome::Succeeded { .. } => UploadState::Succeeded,
            FlushOutcome::Discarded => UploadState::NonRecoverableFailed,
            FlushOutcome::SavedForLater => UploadState::RecoverableFailed,
        }
    }
}

/// A single-use flush of one ended session.
pub struct UploadTask {
    ctx: Arc<DeliveryContext>,
    session: Session,
    events: Vec<Event>,
    state: UploadState,
}

impl UploadTask {
    /// Takes ownership of the session's queued events.
    pub fn new(ctx: Arc<DeliveryContext>, session: Session, events: Vec<Event>) -> Self {
        UploadTask {
            ctx,
            session,
            events,
            state: UploadState::Idle,
        }
    }

    pub fn backend_id(&self) -> &str {
        &self.ctx.settings.backend_id
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    /// Runs the flush to completion.
    pub async fn run(mut self) -> FlushOutcome {
        if self.events.is_empty() {
            log::debug!(
                "[analytics] upload: session {} ended with no events, nothing to send",
                self.session.session_id()
            );
            self.ctx.stats.increment(DeliveryOutcomeType::FlushSkipped);
            return FlushOutcome::Skipped;
        }

        self.transition(UploadState::Composing);
        let batch = self.compose();
        let payload = match serde_json::to_string(&batch) {
            Ok(payload) => payload,
            Err(e) => {
                // Every element is already a `Value`, so this only fails on a serializer bug
                log::error!("[analytics] upload: failed to encode batch, discarding: {e}");
                self.transition(UploadState::NonRecoverableFailed);
                self.ctx.stats.increment(DeliveryOutcomeType::BatchDiscarded);
                self.transition(UploadState::Idle);
                return FlushOutcome::Discarded;
            }
        };
        let headers = self.ctx.batch_headers(self.session.session_id());

        let outcome = if !self.ctx.network.is_online() {
            log::info!(
                "[analytics] upload: offline, saving batch of session {} for later",
                self.session.session_id()
            );
            self.transition(UploadState::RecoverableFailed);
            self.save_for_later(&payload, &headers).await;
            FlushOutcome::SavedForLater
        } else {
            self.transition(UploadState::Sending);
            let result = self.send(&payload, headers.clone()).await;
            match classify_send_result(&result, self.ctx.settings.accepted_status) {
                SendOutcome::Success => {
                    self.transition(UploadState::Succeeded);
                    self.events.clear();
                    self.ctx.stats.increment(DeliveryOutcomeType::BatchSucceeded);
                    let replay = retry_durable_batches(&self.ctx).await;
                    FlushOutcome::Succeeded { replay }
                }
                SendOutcome::NonRecoverableError => {
                    self.transition(UploadState::NonRecoverableFailed);
                    log::error!(
                        "[analytics] upload: collector rejected batch of session {}, \
                         discarding {} event(s): {}; payload: {}",
                        self.session.session_id(),
                        self.events.len(),
                        describe_result(&result),
                        truncate_for_log(&payload)
                    );
                    self.events.clear();
                    self.ctx.stats.increment(DeliveryOutcomeType::BatchDiscarded);
                    FlushOutcome::Discarded
                }
                SendOutcome::RecoverableFailure => {
                    self.transition(UploadState::RecoverableFailed);
                    log::warn!(
                        "[analytics] upload: send failed for session {} ({}), saving for later",
                        self.session.session_id(),
                        describe_result(&result)
                    );
                    self.save_for_later(&payload, &headers).await;
                    FlushOutcome::SavedForLater
                }
            }
        };

        self.transition(UploadState::Idle);
        outcome
    }

    fn compose(&mut self) -> Vec<Value> {
        self.session.end();
        let context = ContextInfo::snapshot(self.ctx.device.as_ref(), &self.ctx.location);
        let batch = compose_batch(
            &self.session,
            &context,
            &self.events,
            &self.ctx.settings.component,
        );
        let dropped = (self.events.len() + 3).saturating_sub(batch.len());
        if dropped > 0 {
            self.ctx
                .stats
                .add(DeliveryOutcomeType::EventDropped, dropped);
        }
        batch
    }

    async fn send(
        &self,
        payload: &str,
        headers: Vec<(String, String)>,
    ) -> Result<TransportResponse, TransportError> {
        let request = TransportRequest {
            method: Method::POST,
            uri: self.ctx.settings.events_url.clone(),
            headers,
            body: payload.to_string(),
        };
        self.ctx
            .transport
            .send(request, PRIMARY_SEND_RETRY_LIMIT)
            .await
    }

    async fn save_for_later(&mut self, payload: &str, headers: &[(String, String)]) {
        let backend_id = self.ctx.settings.backend_id.clone();
        {
            let _guard = self.ctx.locks.lock(&backend_id).await;
            self.ctx
                .store
                .save_for_later(&backend_id, payload, &flatten_headers(headers))
                .await;
        }
        // Handed off to the durable store
        self.events.clear();
        self.ctx
            .stats
            .increment(DeliveryOutcomeType::BatchSavedForLater);
    }

    fn transition(&mut self, next: UploadState) {
        log::trace!(
            "[analytics] upload: session {} {:?} -> {:?}",
            self.session.session_id(),
            self.state,
            next
        );
        self.state = next;
    }
}

fn describe_result(result: &Result<TransportResponse, TransportError>) -> String {
    match result {
        Ok(response) => format!("HTTP {}: {}", response.status, response.body),
        Err(e) => match e.status {
            Some(status) => format!("HTTP {status}: {e}"),
            None => e.to_string(),
        },
    }
}

fn truncate_for_log(payload: &str) -> String {
    if payload.chars().count() <= MAX_LOGGED_PAYLOAD_CHARS {
        return payload.to_string();
    }
    let head: String = payload.chars().take(MAX_LOGGED_PAYLOAD_CHARS).collect();
    format!("{head}... (truncated)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::test_support::{context_with, ScriptedTransport};
    use crate::storage::{FailedBatchStore, MemoryBatchStore};
    use crate::transport::NetworkMonitor;

    const BACKEND: &str = "backend-1";

    struct Offline;

    impl NetworkMonitor for Offline {
        fn is_online(&self) -> bool {
            false
        }
    }

    fn events(n: usize) -> Vec<Event> {
        (0..n)
            .map(|i| Event::new(&format!("e{i}"), None, None).unwrap())
            .collect()
    }

    fn task(ctx: &Arc<DeliveryContext>, n: usize) -> UploadTask {
        UploadTask::new(Arc::clone(ctx), Session::new(), events(n))
    }

    #[tokio::test]
    async fn test_empty_queue_is_skipped_without_network_or_store() {
        let store = Arc::new(MemoryBatchStore::new());
        let transport = Arc::new(ScriptedTransport::with_statuses(&[]));
        let ctx = Arc::new(context_with(transport.clone(), store.clone()));

        let outcome = task(&ctx, 0).run().await;

        assert_eq!(outcome, FlushOutcome::Skipped);
        assert_eq!(outcome.terminal_state(), UploadState::Idle);
        assert!(transport.requests().is_empty());
        assert_eq!(store.save_count(), 0);
        assert_eq!(ctx.stats.get(DeliveryOutcomeType::FlushSkipped), 1);
    }

    #[tokio::test]
    async fn test_success_sends_once_with_primary_retry_limit() {
        let store = Arc::new(MemoryBatchStore::new());
        let transport = Arc::new(ScriptedTransport::with_statuses(&[202]));
        let ctx = Arc::new(context_with(transport.clone(), store.clone()));

        let outcome = task(&ctx, 2).run().await;

        assert_eq!(
            outcome,
            FlushOutcome::Succeeded {
                replay: ReplayReport::default()
            }
        );
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let (request, retry_limit) = &requests[0];
        assert_eq!(*retry_limit, 1);
        assert_eq!(request.method, Method::POST);
        let batch: Vec<Value> = serde_json::from_str(&request.body).unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(store.save_count(), 0);
        assert_eq!(ctx.stats.get(DeliveryOutcomeType::BatchSucceeded), 1);
    }

    #[tokio::test]
    async fn test_success_drains_stored_batches() {
        let store = Arc::new(MemoryBatchStore::new());
        store.save_for_later(BACKEND, "[\"old-1\"]", "").await;
        store.save_for_later(BACKEND, "[\"old-2\"]", "").await;
        let transport = Arc::new(ScriptedTransport::with_statuses(&[202, 202, 503]));
        let ctx = Arc::new(context_with(transport.clone(), store.clone()));

        let outcome = task(&ctx, 1).run().await;

        match outcome {
            FlushOutcome::Succeeded { replay } => {
                assert_eq!(replay.attempted, 2);
                assert_eq!(replay.succeeded, 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let left = store.pending_messages(BACKEND).await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].payload, "[\"old-2\"]");
    }

    #[tokio::test]
    async fn test_rejected_batch_is_never_persisted() {
        for status in [400u16, 405] {
            let store = Arc::new(MemoryBatchStore::new());
            let transport = Arc::new(ScriptedTransport::with_statuses(&[status]));
            let ctx = Arc::new(context_with(transport.clone(), store.clone()));

            let outcome = task(&ctx, 3).run().await;

            assert_eq!(outcome, FlushOutcome::Discarded);
            assert_eq!(outcome.terminal_state(), UploadState::NonRecoverableFailed);
            assert_eq!(store.save_count(), 0);
            assert_eq!(ctx.stats.get(DeliveryOutcomeType::BatchDiscarded), 1);
        }
    }

    #[tokio::test]
    async fn test_opaque_rejection_message_is_discarded() {
        let store = Arc::new(MemoryBatchStore::new());
        let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::new(
            "server answered 405 Method Not Allowed",
        ))]));
        let ctx = Arc::new(context_with(transport, store.clone()));

        assert_eq!(task(&ctx, 1).run().await, FlushOutcome::Discarded);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_recoverable_failure_persists_exact_payload_once() {
        let store = Arc::new(MemoryBatchStore::new());
        let transport = Arc::new(ScriptedTransport::with_statuses(&[503]));
        let ctx = Arc::new(context_with(transport.clone(), store.clone()));

        let outcome = task(&ctx, 2).run().await;

        assert_eq!(outcome, FlushOutcome::SavedForLater);
        assert_eq!(store.save_count(), 1);
        let stored = store.pending_messages(BACKEND).await;
        assert_eq!(stored.len(), 1);

        let sent: Value = serde_json::from_str(&transport.requests()[0].0.body).unwrap();
        let saved: Value = serde_json::from_str(&stored[0].payload).unwrap();
        assert_eq!(sent, saved);
        assert!(stored[0].headers.contains("Content-Type:application/json"));
        assert!(stored[0].headers.contains("Oracle-Mobile-Backend-ID:backend-1"));
    }

    #[tokio::test]
    async fn test_network_error_is_recoverable() {
        let store = Arc::new(MemoryBatchStore::new());
        let transport = Arc::new(ScriptedTransport::new(vec![Err(TransportError::new(
            "operation timed out",
        ))]));
        let ctx = Arc::new(context_with(transport, store.clone()));

        assert_eq!(task(&ctx, 1).run().await, FlushOutcome::SavedForLater);
        assert_eq!(store.len(BACKEND), 1);
    }

    #[tokio::test]
    async fn test_offline_persists_without_transport_call() {
        let store = Arc::new(MemoryBatchStore::new());
        let transport = Arc::new(ScriptedTransport::with_statuses(&[202]));
        let ctx = Arc::new(
            context_with(transport.clone(), store.clone()).with_network(Arc::new(Offline)),
        );

        let outcome = task(&ctx, 2).run().await;

        assert_eq!(outcome, FlushOutcome::SavedForLater);
        assert!(transport.requests().is_empty());
        assert_eq!(store.len(BACKEND), 1);
        let saved: Vec<Value> =
            serde_json::from_str(&store.pending_messages(BACKEND).await[0].payload).unwrap();
        assert_eq!(saved.len(), 5);
    }

    #[tokio::test]
    async fn test_dropped_events_are_counted() {
        let store = Arc::new(MemoryBatchStore::new());
        let transport = Arc::new(ScriptedTransport::with_statuses(&[202]));
        let ctx = Arc::new(context_with(transport.clone(), store));

        let mut queued = events(3);
        queued[1].set_property("note", "x".repeat(crate::config::MAX_PROPERTY_VALUE_LENGTH + 1));
        UploadTask::new(Arc::clone(&ctx), Session::new(), queued)
            .run()
            .await;

        let batch: Vec<Value> = serde_json::from_str(&transport.requests()[0].0.body).unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(ctx.stats.get(DeliveryOutcomeType::EventDropped), 1);
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("[1]"), "[1]");
        let long = "x".repeat(MAX_LOGGED_PAYLOAD_CHARS + 10);
        let truncated = truncate_for_log(&long);
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.len() < long.len() + 16);
    }
}
