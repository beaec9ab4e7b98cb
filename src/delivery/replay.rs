//! Durable batch replay.
//!
//! Drains the failed-batch store of one backend: every stored batch is resent
//! once, the backend's records are purged, and the batches that failed again
//! are saved back in their original order.

use reqwest::Method;

use super::context::DeliveryContext;
use crate::config::REPLAY_SEND_RETRY_LIMIT;
use crate::error_handling::{classify_send_result, DeliveryOutcomeType, SendOutcome};
use crate::storage::{parse_flattened_headers, DurableBatchRecord};
use crate::transport::TransportRequest;

/// What a replay pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Stored batches resent
    pub attempted: usize,
    /// Batches the collector accepted
    pub succeeded: usize,
    /// Batches saved back for the next pass
    pub remaining: usize,
    /// Whether the backend's records were purged
    pub purged: bool,
}

/// Resends every stored batch of the context's backend.
///
/// Holds the backend lock for the whole fetch/send/purge/re-save sequence.
/// Connectivity is not checked: an offline send fails as recoverable and the
/// batch is saved back.
///
/// Records are not deleted one by one. After all sends, the backend is purged
/// and the survivors are saved again. If the process dies between the purge
/// and the last re-save, the survivors not yet saved are lost. If the purge
/// itself fails nothing is re-saved, since the old records are still there.
pub async fn retry_durable_batches(ctx: &DeliveryContext) -> ReplayReport {
    let backend_id = ctx.settings.backend_id.as_str();
    let _guard = ctx.locks.lock(backend_id).await;

    let records = ctx.store.pending_messages(backend_id).await;
    if records.is_empty() {
        log::debug!("[analytics] replay: no stored batches for backend {backend_id}");
        return ReplayReport::default();
    }

    log::info!(
        "[analytics] replay: resending {} stored batch(es) for backend {backend_id}",
        records.len()
    );

    let attempted = records.len();
    let mut survivors: Vec<DurableBatchRecord> = Vec::with_capacity(attempted);
    for record in records {
        match replay_one(ctx, &record).await {
            SendOutcome::Success => ctx.stats.increment(DeliveryOutcomeType::ReplaySucceeded),
            outcome => {
                log::debug!("[analytics] replay: stored batch failed again ({outcome:?})");
                ctx.stats.increment(DeliveryOutcomeType::ReplayFailed);
                survivors.push(record);
            }
        }
    }

    let succeeded = attempted - survivors.len();
    let purged = ctx.store.purge_all_for_backend(backend_id).await;
    if !purged {
        log::error!(
            "[analytics] replay: purge failed for backend {backend_id}, \
             {succeeded} accepted batch(es) may be sent again"
        );
        return ReplayReport {
            attempted,
            succeeded,
            remaining: attempted,
            purged,
        };
    }

    for record in &survivors {
        ctx.store
            .save_for_later(&record.backend_id, &record.payload, &record.headers)
            .await;
    }

    log::info!(
        "[analytics] replay: backend {backend_id} sent {succeeded}/{attempted}, {} kept",
        survivors.len()
    );
    ReplayReport {
        attempted,
        succeeded,
        remaining: survivors.len(),
        purged,
    }
}

async fn replay_one(ctx: &DeliveryContext, record: &DurableBatchRecord) -> SendOutcome {
    let request = TransportRequest {
        method: Method::POST,
        uri: ctx.settings.events_url.clone(),
        headers: parse_flattened_headers(&record.headers),
        body: record.payload.clone(),
    };
    let result = ctx.transport.send(request, REPLAY_SEND_RETRY_LIMIT).await;
    classify_send_result(&result, ctx.settings.accepted_status)
}
