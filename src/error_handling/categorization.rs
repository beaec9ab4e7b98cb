//! Send outcome classification and retry strategy.
//!
//! Every batch send, live or replayed, ends in exactly one of three outcomes.
//! The classification is a pure function of the transport result.

use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

use crate::config::{HTTP_STATUS_BAD_REQUEST, HTTP_STATUS_METHOD_NOT_ALLOWED};
use crate::transport::{TransportError, TransportResponse};

/// Verdict for one attempt to deliver a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendOutcome {
    /// The collector accepted the batch.
    Success,
    /// Timeouts, 5xx, offline and anything unrecognised: keep the batch for a replay.
    RecoverableFailure,
    /// The collector rejected the payload itself (400/405); resending the same bytes cannot help.
    NonRecoverableError,
}

impl SendOutcome {
    pub fn is_success(self) -> bool {
        self == SendOutcome::Success
    }
}

/// Creates an exponential backoff retry strategy for transport-level retries.
///
/// The iterator yields at most `retry_limit` delays, so the total number of
/// attempts is `retry_limit + 1`. A limit of 0 means a single attempt.
pub fn get_retry_strategy(retry_limit: usize) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(crate::config::RETRY_INITIAL_DELAY_MS)
        .factor(crate::config::RETRY_FACTOR)
        .max_delay(Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS))
        .take(retry_limit)
}

/// Classifies the result of a transport call.
///
/// Rules, in priority order:
/// 1. A response carrying `accepted_status` is a success.
/// 2. An error carrying `accepted_status` is a false negative: the request went
///    through even though the transport reported a failure.
/// 3. 400 or 405, from either a response or an error, is non-recoverable.
/// 4. Everything else is recoverable.
///
/// # Arguments
///
/// * `result` - Outcome of `Transport::send`
/// * `accepted_status` - Status code the collector uses for "accepted"
pub fn classify_send_result(
    result: &Result<TransportResponse, TransportError>,
    accepted_status: u16,
) -> SendOutcome {
    match result {
        Ok(response) => classify_status(response.status, accepted_status),
        Err(error) => classify_transport_error(error, accepted_status),
    }
}

/// Classifies a structured status code.
pub fn classify_status(status: u16, accepted_status: u16) -> SendOutcome {
    if status == accepted_status {
        SendOutcome::Success
    } else if is_payload_rejection(status) {
        SendOutcome::NonRecoverableError
    } else {
        SendOutcome::RecoverableFailure
    }
}

/// Classifies a transport failure.
///
/// Uses the structured status when the transport provides one. A request that
/// never got a response is recoverable. Only opaque failures fall back to
/// inspecting the message text.
pub fn classify_transport_error(error: &TransportError, accepted_status: u16) -> SendOutcome {
    match error.status {
        Some(status) => classify_status(status, accepted_status),
        None if error.network => SendOutcome::RecoverableFailure,
        None => classify_error_message(&error.message, accepted_status),
    }
}

/// Classifies an opaque failure by the status codes mentioned in its message.
///
/// Substring matching only; "1202 events" would read as accepted. Transports
/// that know the real status should report it in `TransportError::status`.
pub fn classify_error_message(message: &str, accepted_status: u16) -> SendOutcome {
    if message.contains(&accepted_status.to_string()) {
        return SendOutcome::Success;
    }
    let rejected = [HTTP_STATUS_BAD_REQUEST, HTTP_STATUS_METHOD_NOT_ALLOWED]
        .iter()
        .any(|code| message.contains(&code.to_string()));
    if rejected {
        SendOutcome::NonRecoverableError
    } else {
        SendOutcome::RecoverableFailure
    }
}

fn is_payload_rejection(status: u16) -> bool {
    status == HTTP_STATUS_BAD_REQUEST || status == HTTP_STATUS_METHOD_NOT_ALLOWED
}
