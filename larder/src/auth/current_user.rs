//! Axum extractor resolving the session cookie to the authenticated user.

use axum::{extract::FromRequestParts, http::header, http::request::Parts, http::HeaderMap};

use crate::{
    auth::session,
    errors::{Error, Result},
    AppState,
};

/// The authenticated user for the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub email: String,
    /// The raw session token, kept so handlers can revoke the session
    /// (logout, account deletion).
    pub session_token: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        maybe_current_user(&parts.headers, state).await.ok_or(Error::Unauthenticated {
            message: Some("Please log in to access this resource".to_string()),
        })
    }
}

/// Resolves the session cookie if present and valid; `None` otherwise.
///
/// Used directly by handlers where authentication is optional (the recipe
/// endpoint works for anonymous callers that bring their own API key).
pub async fn maybe_current_user(headers: &HeaderMap, state: &AppState) -> Option<CurrentUser> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    let token = session::token_from_cookie_header(cookie_header)?;
    let record = state.sessions.get(&token).await?;

    Some(CurrentUser {
        email: record.email,
        session_token: token,
    })
}
