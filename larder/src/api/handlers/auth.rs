//! Magic-link authentication endpoints.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    api::handlers::with_rate_limit_headers,
    api::models::auth::{LoginRequest, LoginResponse, LogoutResponse, VerifyQuery},
    auth::session,
    errors::{Error, Result},
    limits::client_identifier,
    AppState,
};

/// Request a magic-link login email.
///
/// The response is the same whether or not an account already existed for the
/// address, so the endpoint cannot be used to probe for accounts.
#[utoipa::path(
    post,
    path = "/api/auth/request-login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login link sent", body = LoginResponse),
        (status = 400, description = "Invalid email address"),
        (status = 429, description = "Too many login requests"),
        (status = 500, description = "Email service not configured"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn request_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    let Some(email_service) = state.email.clone() else {
        return Err(Error::Internal {
            operation: "send login link: email service is not configured".to_string(),
        });
    };

    let identifier = client_identifier(&headers);
    let decision = state.auth_limiter.check(&identifier).await?;
    if !decision.allowed {
        return Err(Error::TooManyRequests {
            message: "Too many login requests".to_string(),
            decision,
        });
    }

    request.validate()?;
    let email = request.email;

    state.users.get_or_create(&email).await?;
    let token = state.magic_links.create(&email).await?;
    email_service
        .send_magic_link_email(&email, &state.config.base_url, &token)
        .await?;

    let response = Json(LoginResponse {
        success: true,
        message: "Login link sent! Check your email.".to_string(),
    })
    .into_response();
    Ok(with_rate_limit_headers(response, &decision))
}

/// Verify a magic-link token and establish a session.
///
/// Redirects back to the frontend in all outcomes; expired, consumed, and
/// unknown tokens share one error indicator.
#[utoipa::path(
    get,
    path = "/api/auth/verify",
    params(VerifyQuery),
    tag = "authentication",
    responses(
        (status = 302, description = "Redirect with session cookie on success, error indicator otherwise"),
        (status = 400, description = "Missing token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_login(State(state): State<AppState>, Query(query): Query<VerifyQuery>) -> Result<Response> {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return Err(Error::BadRequest {
            message: "Missing token".to_string(),
        });
    };

    let Some(email) = state.magic_links.verify(&token).await else {
        return Ok(redirect("/?error=invalid_or_expired_link"));
    };

    match state.sessions.create(&email).await {
        Ok(session_token) => {
            let mut response = redirect("/?login=success");
            if let Ok(cookie) = HeaderValue::from_str(&session::session_cookie(&session_token)) {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            Ok(response)
        }
        Err(e) => {
            tracing::error!("failed to create session after magic link verification: {e:#}");
            Ok(redirect("/?error=verification_failed"))
        }
    }
}

/// Log out, revoking the current session.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logged out", body = LogoutResponse),
        (status = 401, description = "No active session"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let token = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(session::token_from_cookie_header)
        .ok_or(Error::Unauthenticated {
            message: Some("No active session found".to_string()),
        })?;

    state.sessions.delete(&token).await;

    let mut response = Json(LogoutResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    })
    .into_response();
    if let Ok(cookie) = HeaderValue::from_str(&session::clear_session_cookie()) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

fn redirect(location: &'static str) -> Response {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::FOUND.into_response())
}
