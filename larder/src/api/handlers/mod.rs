//! HTTP request handlers for all API endpoints.
//!
//! Each handler validates its payload, runs the relevant stores and clients,
//! and serializes the response. Errors convert to JSON error bodies through
//! [`crate::errors::Error`].
//!
//! - [`recipes`]: recipe generation (buffered and streaming)
//! - [`auth`]: magic-link login request, verification, and logout
//! - [`users`]: profile retrieval, update, deletion, and sync
//! - [`info`]: the service info document

pub mod auth;
pub mod info;
pub mod recipes;
pub mod users;

use axum::http::HeaderValue;
use axum::response::Response;

use crate::limits::RateLimitDecision;

/// Attaches the rate-limit headers to an outgoing response. Applied to both
/// success and error responses on throttled paths, so clients can always see
/// their remaining budget.
pub(crate) fn with_rate_limit_headers(mut response: Response, decision: &RateLimitDecision) -> Response {
    let headers = response.headers_mut();
    for (name, value) in decision.headers() {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
    response
}
