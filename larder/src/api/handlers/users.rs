//! User profile endpoints. All of these require an authenticated session.

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    api::models::users::{DeleteAccountResponse, SyncRequest, SyncResponse, UpdateProfileRequest, UpdateProfileResponse},
    auth::{session, CurrentUser},
    errors::{Error, Result},
    users::{UserProfile, UserUpdate},
    AppState,
};

/// Get the current user's profile. The stored API key is reported only as a
/// presence flag.
#[utoipa::path(
    get,
    path = "/api/user",
    tag = "users",
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Profile not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_profile(State(state): State<AppState>, user: CurrentUser) -> Result<Json<UserProfile>> {
    let record = state.users.get(&user.email).await?.ok_or(Error::NotFound {
        resource: "User".to_string(),
    })?;
    Ok(Json(UserProfile::from(&record)))
}

/// Update dietary preference and/or the stored API key. An empty-string key
/// removes the stored key.
#[utoipa::path(
    put,
    path = "/api/user",
    request_body = UpdateProfileRequest,
    tag = "users",
    responses(
        (status = 200, description = "Updated profile", body = UpdateProfileResponse),
        (status = 400, description = "Invalid request data"),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>> {
    request.validate()?;

    let api_key_encrypted = match request.api_key {
        Some(key) => Some(state.users.encrypt_api_key_field(&key)?),
        None => None,
    };
    let update = UserUpdate {
        items: None,
        dietary: request.dietary,
        api_key_encrypted,
    };

    let record = state.users.update(&user.email, update).await?.ok_or(Error::Internal {
        operation: "update user profile".to_string(),
    })?;

    Ok(Json(UpdateProfileResponse {
        success: true,
        profile: UserProfile::from(&record),
    }))
}

/// Delete the account and revoke the current session.
#[utoipa::path(
    delete,
    path = "/api/user",
    tag = "users",
    responses(
        (status = 200, description = "Account deleted", body = DeleteAccountResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Profile not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_account(State(state): State<AppState>, user: CurrentUser) -> Result<Response> {
    if !state.users.delete(&user.email).await? {
        return Err(Error::NotFound {
            resource: "User".to_string(),
        });
    }

    state.sessions.delete(&user.session_token).await;

    let mut response = Json(DeleteAccountResponse {
        success: true,
        message: "Account deleted successfully".to_string(),
    })
    .into_response();
    if let Ok(cookie) = HeaderValue::from_str(&session::clear_session_cookie()) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

/// Sync the client's local ingredient list and preferences into the account.
/// Last write wins; a supplied non-empty API key is encrypted and stored.
#[utoipa::path(
    post,
    path = "/api/user/sync",
    request_body = SyncRequest,
    tag = "users",
    responses(
        (status = 200, description = "Data synced", body = SyncResponse),
        (status = 400, description = "Invalid request data"),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn sync_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>> {
    request.validate()?;

    let record = state
        .users
        .sync_from_client(&user.email, request.items, request.dietary, request.api_key.as_deref())
        .await?;

    Ok(Json(SyncResponse {
        success: true,
        message: "Data synced successfully".to_string(),
        profile: UserProfile::from(&record),
    }))
}
