//! Service info endpoint.

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

use crate::api::models::info::{ApiInfo, EndpointInfo};
use crate::config::WindowConfig;
use crate::AppState;

/// Describe the API and its endpoints. Cacheable for an hour.
#[utoipa::path(
    get,
    path = "/api",
    tag = "info",
    responses(
        (status = 200, description = "Service info", body = ApiInfo),
    )
)]
pub async fn api_info(State(state): State<AppState>) -> Response {
    let info = ApiInfo {
        name: "Larder API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "AI-powered recipe suggestion API based on available ingredients".to_string(),
        endpoints: vec![
            EndpointInfo {
                path: "/api/recipes".to_string(),
                method: "POST".to_string(),
                description: "Generate recipe suggestions based on ingredients".to_string(),
                rate_limit: Some(describe_limit(&state.config.rate_limits.api)),
            },
            EndpointInfo {
                path: "/api/auth/request-login".to_string(),
                method: "POST".to_string(),
                description: "Request a magic-link login email".to_string(),
                rate_limit: Some(describe_limit(&state.config.rate_limits.auth)),
            },
            EndpointInfo {
                path: "/api/auth/verify".to_string(),
                method: "GET".to_string(),
                description: "Verify a magic-link token and start a session".to_string(),
                rate_limit: None,
            },
            EndpointInfo {
                path: "/api/auth/logout".to_string(),
                method: "POST".to_string(),
                description: "Revoke the current session".to_string(),
                rate_limit: None,
            },
            EndpointInfo {
                path: "/api/user".to_string(),
                method: "GET, PUT, DELETE".to_string(),
                description: "Fetch, update, or delete the user profile".to_string(),
                rate_limit: None,
            },
            EndpointInfo {
                path: "/api/user/sync".to_string(),
                method: "POST".to_string(),
                description: "Sync local ingredients and preferences into the account".to_string(),
                rate_limit: None,
            },
        ],
    };

    let mut response = Json(info).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600"));
    response
}

fn describe_limit(window: &WindowConfig) -> String {
    let secs = window.window.as_secs();
    let period = match secs {
        60 => "minute".to_string(),
        3600 => "hour".to_string(),
        _ if secs % 60 == 0 => format!("{} minutes", secs / 60),
        _ => format!("{secs} seconds"),
    };
    format!("{} requests per {} per client", window.limit, period)
}
