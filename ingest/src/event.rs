use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::IngestError;

/// An inbound submission, before any validation. The caller owns the
/// idempotency key: `id` is never generated server-side, otherwise
/// client-driven dedup on resubmission would be impossible.
#[derive(Debug, Default, Deserialize)]
pub struct EventSubmission {
    #[serde(default, alias = "token")]
    pub api_key: Option<String>,
    #[serde(default, alias = "event_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl EventSubmission {
    pub fn from_bytes(bytes: Bytes) -> Result<EventSubmission, IngestError> {
        tracing::debug!(len = bytes.len(), "decoding new event");

        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// The canonical, store-ready representation of an accepted event.
/// Exactly one envelope is enqueued per accepted submission.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct EventEnvelope {
    pub api_key: String,
    pub event_id: String,
    pub payload: Value,
    /// Server-assigned RFC 3339 UTC timestamp.
    pub received_at: String,
}
