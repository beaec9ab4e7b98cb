// storage/models.rs
// Durable store record types

/// A batch kept for a later replay.
///
/// `payload` is the exact JSON array text that was (or would have been) sent,
/// so replays preserve the composed event order byte for byte. `headers` is the
/// flattened `key:value,key:value` form produced by `flatten_headers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurableBatchRecord {
    pub backend_id: String,
    pub payload: String,
    pub headers: String,
}

impl DurableBatchRecord {
    pub fn new(
        backend_id: impl Into<String>,
        payload: impl Into<String>,
        headers: impl Into<String>,
    ) -> Self {
        DurableBatchRecord {
            backend_id: backend_id.into(),
            payload: payload.into(),
            headers: headers.into(),
        }
    }
}
