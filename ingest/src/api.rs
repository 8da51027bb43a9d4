use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::InvalidApiKeyReason;

/// Body returned for every accepted submission, duplicate or not.
/// Duplicates are a successful no-op, never an error surfaced to the client.
#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub event_id: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to decode request: {0}")]
    RequestDecodingError(String),
    #[error("failed to parse request: {0}")]
    RequestParsingError(#[from] serde_json::Error),

    #[error("event_id is required")]
    MissingEventId,
    #[error("payload is required")]
    MissingPayload,

    #[error("event submitted without an api_key")]
    NoApiKeyError,
    #[error("api_key is not valid: {0}")]
    ApiKeyValidationError(#[from] InvalidApiKeyReason),

    // An envelope that cannot be encoded is a client problem, not a store
    // problem: report it as invalid and don't retry.
    #[error("invalid event could not be encoded")]
    NonRetryableSinkError,

    // Safe to retry: the dedup marker makes resubmission idempotent.
    #[error("transient store error, please retry")]
    StoreUnavailable,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match self {
            IngestError::RequestDecodingError(_)
            | IngestError::RequestParsingError(_)
            | IngestError::MissingEventId
            | IngestError::MissingPayload
            | IngestError::NonRetryableSinkError => StatusCode::BAD_REQUEST,

            IngestError::NoApiKeyError | IngestError::ApiKeyValidationError(_) => {
                StatusCode::UNAUTHORIZED
            }

            IngestError::StoreUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
