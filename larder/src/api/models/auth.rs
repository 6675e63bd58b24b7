//! API request/response models for authentication.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::{Error, Result};

/// Emails longer than this are rejected outright (RFC 5321 limit).
const MAX_EMAIL_CHARS: usize = 254;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_email(&self.email) {
            return Err(Error::Validation {
                field: Some("email".to_string()),
                message: "Invalid email address".to_string(),
            });
        }
        Ok(())
    }
}

/// A pragmatic format check: one `@`, non-empty local part, and a dotted
/// domain. Actual deliverability is proven by the magic link itself.
fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_CHARS {
        return false;
    }
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.split_once('.') {
        Some((head, tail)) => !head.is_empty() && !tail.is_empty() && !tail.ends_with('.'),
        None => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

/// Query parameters for the magic-link verification endpoint.
#[derive(Debug, Deserialize, IntoParams)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_addresses() {
        for email in ["a@example.com", "first.last@sub.example.co.uk", "x+tag@example.io"] {
            assert!(is_valid_email(email), "{email} should be valid");
        }
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        for email in [
            "",
            "no-at-sign",
            "@example.com",
            "a@",
            "a@nodot",
            "a b@example.com",
            "a@example.com.",
            "a@@example.com",
        ] {
            assert!(!is_valid_email(email), "{email} should be invalid");
        }
    }

    #[test]
    fn test_rejects_overlong_address() {
        let email = format!("{}@example.com", "a".repeat(250));
        assert!(!is_valid_email(&email));
    }

    #[test]
    fn test_login_request_validation_error_names_field() {
        let err = LoginRequest { email: "nope".to_string() }.validate().unwrap_err();
        match err {
            Error::Validation { field, .. } => assert_eq!(field.as_deref(), Some("email")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
