use std::error::Error;
use std::fmt::Display;

// Validate that an API key is the correct shape before touching the store.
// Keys are issued by the auth service and always carry the `sync_` prefix.

pub const API_KEY_PREFIX: &str = "sync_";

const MAX_API_KEY_LENGTH: usize = 64;

#[derive(Debug, PartialEq, Eq)]
pub enum InvalidApiKeyReason {
    IsEmpty,
    IsTooLong,
    IsNotAscii,
    MissingPrefix,
}

impl InvalidApiKeyReason {
    pub fn reason(&self) -> &str {
        match *self {
            Self::IsEmpty => "empty",
            Self::IsTooLong => "too_long",
            Self::IsNotAscii => "not_ascii",
            Self::MissingPrefix => "missing_prefix",
        }
    }
}

impl Display for InvalidApiKeyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

impl Error for InvalidApiKeyReason {
    fn description(&self) -> &str {
        self.reason()
    }
}

/// Check if a key is the right shape. It may still be unknown to the auth
/// service: the submitted key is carried as an opaque attribution string,
/// not checked against the credential store on the hot path.
pub fn validate_api_key(key: &str) -> Result<(), InvalidApiKeyReason> {
    if key.is_empty() {
        return Err(InvalidApiKeyReason::IsEmpty);
    }

    if key.len() > MAX_API_KEY_LENGTH {
        return Err(InvalidApiKeyReason::IsTooLong);
    }

    if !key.is_ascii() {
        return Err(InvalidApiKeyReason::IsNotAscii);
    }

    if !key.starts_with(API_KEY_PREFIX) {
        return Err(InvalidApiKeyReason::MissingPrefix);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::token::{validate_api_key, InvalidApiKeyReason};

    #[test]
    fn blocks_empty_keys() {
        let valid = validate_api_key("");

        assert!(valid.is_err());
        assert_eq!(valid.unwrap_err(), InvalidApiKeyReason::IsEmpty);
    }

    #[test]
    fn blocks_too_long_keys() {
        let valid = validate_api_key(
            "sync_xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
        );

        assert!(valid.is_err());
        assert_eq!(valid.unwrap_err(), InvalidApiKeyReason::IsTooLong);
    }

    #[test]
    fn blocks_non_ascii_keys() {
        let valid = validate_api_key("sync_🦀");

        assert!(valid.is_err());
        assert_eq!(valid.unwrap_err(), InvalidApiKeyReason::IsNotAscii);
    }

    #[test]
    fn blocks_keys_without_prefix() {
        let valid = validate_api_key("phc_1234567890");

        assert!(valid.is_err());
        assert_eq!(valid.unwrap_err(), InvalidApiKeyReason::MissingPrefix);
    }

    #[test]
    fn accepts_issued_keys() {
        assert!(validate_api_key("sync_V1StGXR8_Z5jdHi6B-myT").is_ok());
    }
}
