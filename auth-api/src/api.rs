use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("an account with this email already exists")]
    UserAlreadyExists,

    // Unknown email and bad password are deliberately indistinguishable.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("failed to hash password")]
    PasswordHash,

    #[error("failed to mint bearer token")]
    TokenCreation,

    #[error("database is unavailable")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::UserAlreadyExists => StatusCode::CONFLICT,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::PasswordHash | AuthError::TokenCreation => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AuthError::Database(ref e) => {
                tracing::error!("database error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
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
