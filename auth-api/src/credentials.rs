use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::AuthError;
use crate::user::User;

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiry_hours: i64,
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

pub fn verify_password(hash: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

/// Bearer token claims. The api_key rides along so session-authenticated
/// callers can submit events without a second credential lookup.
#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub api_key: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn mint_token(user: &User, config: &JwtConfig) -> Result<String, AuthError> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        api_key: user.api_key.clone(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(config.expiry_hours)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|_| AuthError::TokenCreation)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{decode_token, hash_password, mint_token, verify_password, JwtConfig};
    use crate::user::{generate_api_key, User};

    fn test_user() -> User {
        User {
            id: Uuid::now_v7(),
            email: String::from("test@example.com"),
            password_hash: String::from("unused"),
            name: String::from("Test"),
            api_key: generate_api_key(),
            is_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("hunter2hunter2").unwrap();

        assert_ne!(hash, "hunter2hunter2");
        assert!(verify_password(&hash, "hunter2hunter2"));
        assert!(!verify_password(&hash, "wrong-password"));
    }

    #[test]
    fn garbage_hashes_never_verify() {
        assert!(!verify_password("not a phc string", "anything"));
    }

    #[test]
    fn token_roundtrips_with_the_right_secret() {
        let user = test_user();
        let config = JwtConfig {
            secret: String::from("test-secret"),
            expiry_hours: 24,
        };

        let token = mint_token(&user, &config).unwrap();
        let claims = decode_token(&token, "test-secret").unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.api_key, user.api_key);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_fails_with_the_wrong_secret() {
        let user = test_user();
        let config = JwtConfig {
            secret: String::from("test-secret"),
            expiry_hours: 24,
        };

        let token = mint_token(&user, &config).unwrap();
        assert!(decode_token(&token, "other-secret").is_err());
    }
}
