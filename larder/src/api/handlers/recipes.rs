//! Recipe generation endpoint.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    api::handlers::with_rate_limit_headers,
    api::models::recipes::{RecipeRequest, RecipeResponse, RecipesBody, ResponseFormat, StructuredRecipes},
    auth::current_user::maybe_current_user,
    errors::{Error, Result},
    limits::client_identifier,
    llm::ChatMessage,
    prompts, schemas, AppState,
};

/// Header through which a request can carry its own provider API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Generate recipe suggestions from a list of ingredients.
///
/// With `Accept: text/event-stream` the completion is relayed as raw text
/// fragments in arrival order; otherwise a single JSON document is returned,
/// freeform or schema-constrained depending on `format`.
#[utoipa::path(
    post,
    path = "/api/recipes",
    request_body = RecipeRequest,
    tag = "recipes",
    responses(
        (status = 200, description = "Recipe suggestions", body = RecipeResponse),
        (status = 400, description = "Invalid request data"),
        (status = 401, description = "No API key available"),
        (status = 429, description = "Rate limit exceeded"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn generate_recipes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RecipeRequest>,
) -> Response {
    let identifier = client_identifier(&headers);
    let decision = state.api_limiter.check(&identifier);
    if !decision.allowed {
        return Error::TooManyRequests {
            message: "Too many requests".to_string(),
            decision,
        }
        .into_response();
    }

    let response = match handle(&state, &headers, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };
    with_rate_limit_headers(response, &decision)
}

async fn handle(state: &AppState, headers: &HeaderMap, request: RecipeRequest) -> Result<Response> {
    // Key resolution comes before payload validation, so a request with no
    // usable key is told about the key first.
    let api_key = resolve_api_key(state, headers).await?;
    request.validate()?;

    let messages = [
        ChatMessage::system(prompts::system_message(request.mode, request.num_recipes, request.full_steps)),
        ChatMessage::user(prompts::user_prompt(
            &request.items,
            request.requirements.as_deref(),
            request.num_recipes,
        )),
    ];

    if wants_stream(headers) {
        let stream = state.llm.stream_completion(&api_key, &messages).await?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from_stream(stream))
            .map_err(|e| Error::Internal {
                operation: format!("build streaming response: {e}"),
            })?;
        return Ok(response);
    }

    let body = match request.format {
        ResponseFormat::Structured => {
            let response_format = schemas::recipe_response_format(request.num_recipes, request.full_steps);
            let content = state.llm.complete(&api_key, &messages, Some(&response_format)).await?;
            let parsed: StructuredRecipes = serde_json::from_str(&content).map_err(|e| Error::Upstream {
                message: "Failed to generate recipes. Please try again.".to_string(),
                detail: Some(format!("structured response did not match schema: {e}")),
            })?;
            RecipeResponse {
                recipes: RecipesBody::Recipes(parsed.recipes),
            }
        }
        ResponseFormat::Text => {
            let content = state.llm.complete(&api_key, &messages, None).await?;
            RecipeResponse {
                recipes: RecipesBody::Text(content),
            }
        }
    };

    Ok(Json(body).into_response())
}

/// Resolves the provider API key: request header, then the authenticated
/// user's stored key, then the configured server fallback.
async fn resolve_api_key(state: &AppState, headers: &HeaderMap) -> Result<String> {
    if let Some(value) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        let value = value.trim();
        if !value.is_empty() {
            return Ok(value.to_string());
        }
    }

    if let Some(user) = maybe_current_user(headers, state).await {
        if let Some(key) = state.users.api_key(&user.email).await? {
            return Ok(key);
        }
    }

    if let Some(key) = state.config.llm.api_key.as_deref().filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    Err(Error::ApiKeyMissing {
        message: "API key required. Send one in the X-Api-Key header or save one to your profile.".to_string(),
    })
}

fn wants_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}
