use axum::http::{HeaderMap, StatusCode};
use axum::extract::State;
use axum::Json;
use axum_client_ip::InsecureClientIp;
use bytes::Bytes;
use metrics::counter;
use tracing::instrument;

use crate::api::{IngestError, SubmitResponse};
use crate::dedup::DedupDecision;
use crate::event::{EventEnvelope, EventSubmission};
use crate::prometheus::report_dropped_events;
use crate::router;
use crate::token::validate_api_key;

/// Accept an externally-submitted analytics event.
///
/// Identity and validation failures are rejected before any store access.
/// The idempotency gate is a single atomic conditional set, so concurrent
/// resubmissions of one event_id enqueue exactly one envelope.
#[instrument(skip_all, fields(event_id, ip = %ip))]
pub async fn event(
    State(state): State<router::State>,
    InsecureClientIp(ip): InsecureClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<SubmitResponse>), IngestError> {
    let submission = EventSubmission::from_bytes(body)?;

    let api_key = resolve_api_key(&submission, &headers)?;
    validate_api_key(&api_key)?;

    let event_id = match submission.id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(IngestError::MissingEventId),
    };
    tracing::Span::current().record("event_id", event_id.as_str());

    let Some(payload) = submission.payload else {
        return Err(IngestError::MissingPayload);
    };

    counter!("ingest_events_received_total").increment(1);

    match state.dedup.check_and_mark(&event_id).await? {
        DedupDecision::AlreadyQueued => {
            counter!("ingest_events_duplicate_total").increment(1);
            tracing::debug!("duplicate submission ignored");

            Ok((
                StatusCode::OK,
                Json(SubmitResponse {
                    success: true,
                    message: String::from("event already queued"),
                    event_id,
                }),
            ))
        }
        DedupDecision::FirstSeen => {
            let envelope = EventEnvelope {
                api_key,
                event_id: event_id.clone(),
                payload,
                received_at: state.timesource.current_time(),
            };

            if let Err(err) = state.sink.send(envelope).await {
                report_dropped_events("enqueue_failed", 1);
                // Marker set but no envelope: the retry will read the marker
                // and report a duplicate, losing this event until the marker
                // expires. Known loss window, bounded by the retention.
                tracing::error!(
                    event_id = %event_id,
                    "enqueue failed after the dedup marker was set: {}",
                    err
                );
                return Err(err);
            }

            Ok((
                StatusCode::ACCEPTED,
                Json(SubmitResponse {
                    success: true,
                    message: String::from("event queued"),
                    event_id,
                }),
            ))
        }
    }
}

/// The caller identity is resolved from the body's api_key, falling back to
/// the X-Api-Key header. It is treated as an opaque attribution string on
/// the envelope, never as a permission check on the payload.
fn resolve_api_key(
    submission: &EventSubmission,
    headers: &HeaderMap,
) -> Result<String, IngestError> {
    if let Some(key) = &submission.api_key {
        return Ok(key.clone());
    }

    match headers.get("x-api-key") {
        Some(value) => value.to_str().map(String::from).map_err(|_| {
            IngestError::RequestDecodingError(String::from("invalid x-api-key header"))
        }),
        None => Err(IngestError::NoApiKeyError),
    }
}
