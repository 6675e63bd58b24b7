use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error as ThisError;

use crate::kv::KvError;
use crate::limits::RateLimitDecision;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Request payload failed schema validation
    #[error("{message}")]
    Validation { field: Option<String>, message: String },

    /// Invalid request outside of field-level validation (bad JSON, missing query params, ...)
    #[error("{message}")]
    BadRequest { message: String },

    /// Authentication required but not provided, or the session is no longer valid
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// No provider API key could be resolved for the request
    #[error("{message}")]
    ApiKeyMissing { message: String },

    /// Requested resource not found
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Local rate limit exceeded
    #[error("{message}")]
    TooManyRequests {
        message: String,
        decision: RateLimitDecision,
    },

    /// The LLM provider rejected the supplied API key
    #[error("Invalid API key")]
    UpstreamAuth { detail: Option<String> },

    /// The LLM provider applied its own rate limiting
    #[error("API rate limit exceeded")]
    UpstreamRateLimited { detail: Option<String> },

    /// Any other upstream provider failure (LLM or email)
    #[error("{message}")]
    Upstream { message: String, detail: Option<String> },

    /// Key-value store fault
    #[error(transparent)]
    Store(#[from] KvError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Machine-readable error codes carried in every JSON error body.
///
/// Clients dispatch on these rather than on the human-readable message.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const API_KEY_MISSING: &str = "API_KEY_MISSING";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const EXTERNAL_API_ERROR: &str = "EXTERNAL_API_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// JSON error body: `{"error": ..., "code": ..., "details": ...}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Unauthenticated { .. } | Error::ApiKeyMissing { .. } | Error::UpstreamAuth { .. } => StatusCode::UNAUTHORIZED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::TooManyRequests { .. } | Error::UpstreamRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Upstream { .. } | Error::Store(_) | Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation { .. } => codes::VALIDATION_ERROR,
            Error::BadRequest { .. } | Error::NotFound { .. } => codes::INVALID_REQUEST,
            Error::Unauthenticated { .. } | Error::ApiKeyMissing { .. } | Error::UpstreamAuth { .. } => codes::API_KEY_MISSING,
            Error::TooManyRequests { .. } | Error::UpstreamRateLimited { .. } => codes::RATE_LIMIT_EXCEEDED,
            Error::Upstream { .. } => codes::EXTERNAL_API_ERROR,
            Error::Store(_) | Error::Internal { .. } | Error::Other(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { .. } => "Invalid request data".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Not authenticated".to_string()),
            Error::ApiKeyMissing { message } => message.clone(),
            Error::NotFound { resource } => format!("{resource} not found"),
            Error::TooManyRequests { message, .. } => message.clone(),
            Error::UpstreamAuth { .. } => "Invalid API key".to_string(),
            Error::UpstreamRateLimited { .. } => "API rate limit exceeded".to_string(),
            Error::Upstream { message, .. } => message.clone(),
            Error::Store(_) | Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }

    /// Optional human-readable detail text for the JSON body.
    fn details(&self) -> Option<String> {
        match self {
            Error::Validation { field, message } => Some(match field {
                Some(field) => format!("{field}: {message}"),
                None => message.clone(),
            }),
            Error::TooManyRequests { decision, .. } => {
                Some(format!("Rate limit resets at {}", decision.reset_at.to_rfc3339()))
            }
            Error::UpstreamAuth { detail } | Error::UpstreamRateLimited { detail } | Error::Upstream { detail, .. } => detail.clone(),
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Store(_) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Upstream { .. } | Error::UpstreamAuth { .. } | Error::UpstreamRateLimited { .. } => {
                tracing::warn!("Upstream provider error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::ApiKeyMissing { .. } => {
                tracing::info!("Authentication error: {}", self);
            }
            Error::Validation { .. } | Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::TooManyRequests { .. } => {
                tracing::debug!("Rate limited: {}", self);
            }
        }

        let status = self.status_code();
        let body = ErrorBody {
            error: self.user_message(),
            code: self.code(),
            details: self.details(),
        };

        let mut response = (status, Json(body)).into_response();

        // Throttled responses carry the rate-limit headers plus a retry hint so
        // clients can self-throttle.
        if let Error::TooManyRequests { decision, .. } = &self {
            let headers = response.headers_mut();
            for (name, value) in decision.headers() {
                if let Ok(value) = HeaderValue::from_str(&value) {
                    headers.insert(name, value);
                }
            }
            if let Ok(value) = HeaderValue::from_str(&decision.retry_after_secs().to_string()) {
                headers.insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
