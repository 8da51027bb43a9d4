use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::AuthError;
use crate::credentials;
use crate::handlers::AppState;
use crate::user::{self, User};

const MIN_PASSWORD_LENGTH: usize = 8;
const MIN_NAME_LENGTH: usize = 2;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SigninResponse {
    pub user: User,
    pub token: String,
}

#[instrument(skip_all, fields(email = %request.email))]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AuthError> {
    validate_signup(&request)?;

    let password_hash = credentials::hash_password(&request.password)?;
    let api_key = user::generate_api_key();

    let user = user::create_user(
        &state.pool,
        &request.email,
        &password_hash,
        &request.name,
        &api_key,
    )
    .await?;

    tracing::info!(user_id = %user.id, "user created");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            success: true,
            message: String::from("Signup successful. Please verify your email."),
        }),
    ))
}

#[instrument(skip_all, fields(email = %request.email))]
pub async fn signin(
    State(state): State<AppState>,
    Json(request): Json<SigninRequest>,
) -> Result<Json<SigninResponse>, AuthError> {
    validate_signin(&request)?;

    let user = user::get_user_by_email(&state.pool, &request.email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !credentials::verify_password(&user.password_hash, &request.password) {
        tracing::warn!(user_id = %user.id, "invalid password attempt");
        return Err(AuthError::InvalidCredentials);
    }

    let token = credentials::mint_token(&user, &state.jwt)?;

    tracing::info!(user_id = %user.id, "user signed in");

    Ok(Json(SigninResponse { user, token }))
}

fn validate_signup(request: &SignupRequest) -> Result<(), AuthError> {
    validate_email(&request.email)?;

    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::InvalidRequest(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    if request.name.trim().chars().count() < MIN_NAME_LENGTH {
        return Err(AuthError::InvalidRequest(format!(
            "name must be at least {MIN_NAME_LENGTH} characters"
        )));
    }

    Ok(())
}

fn validate_signin(request: &SigninRequest) -> Result<(), AuthError> {
    validate_email(&request.email)?;

    if request.password.is_empty() {
        return Err(AuthError::InvalidRequest(String::from(
            "password is required",
        )));
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    // Shape check only, deliverability is the verification email's problem.
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    };

    if !well_formed {
        return Err(AuthError::InvalidRequest(String::from(
            "a valid email is required",
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_signin, validate_signup, SigninRequest, SignupRequest};
    use crate::api::AuthError;

    fn signup(email: &str, password: &str, name: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn accepts_a_well_formed_signup() {
        assert!(validate_signup(&signup("a@example.com", "longenough", "Ada")).is_ok());
    }

    #[test]
    fn rejects_malformed_emails() {
        for email in ["", "no-at-sign", "@example.com", "a@nodot"] {
            let result = validate_signup(&signup(email, "longenough", "Ada"));
            assert!(matches!(result, Err(AuthError::InvalidRequest(_))), "{email}");
        }
    }

    #[test]
    fn rejects_short_passwords() {
        let result = validate_signup(&signup("a@example.com", "short", "Ada"));
        assert!(matches!(result, Err(AuthError::InvalidRequest(_))));
    }

    #[test]
    fn rejects_blank_names() {
        let result = validate_signup(&signup("a@example.com", "longenough", " "));
        assert!(matches!(result, Err(AuthError::InvalidRequest(_))));
    }

    #[test]
    fn signin_requires_a_password() {
        let result = validate_signin(&SigninRequest {
            email: String::from("a@example.com"),
            password: String::new(),
        });
        assert!(matches!(result, Err(AuthError::InvalidRequest(_))));
    }
}
