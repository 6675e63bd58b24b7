//! OpenAPI documentation for the HTTP API, served at `/api/docs`.

use utoipa::OpenApi;

use crate::api;
use crate::api::models::{auth, info, recipes, users};
use crate::prompts::Mode;
use crate::users::UserProfile;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Larder API",
        description = "AI-powered recipe suggestion API based on available ingredients"
    ),
    paths(
        api::handlers::info::api_info,
        api::handlers::recipes::generate_recipes,
        api::handlers::auth::request_login,
        api::handlers::auth::verify_login,
        api::handlers::auth::logout,
        api::handlers::users::get_profile,
        api::handlers::users::update_profile,
        api::handlers::users::delete_account,
        api::handlers::users::sync_profile,
    ),
    components(schemas(
        info::ApiInfo,
        info::EndpointInfo,
        recipes::RecipeRequest,
        recipes::RecipeResponse,
        recipes::RecipesBody,
        recipes::Recipe,
        recipes::RecipeStep,
        recipes::ResponseFormat,
        Mode,
        auth::LoginRequest,
        auth::LoginResponse,
        auth::LogoutResponse,
        users::UpdateProfileRequest,
        users::UpdateProfileResponse,
        users::SyncRequest,
        users::SyncResponse,
        users::DeleteAccountResponse,
        UserProfile,
    )),
    tags(
        (name = "info", description = "Service metadata"),
        (name = "recipes", description = "Recipe generation"),
        (name = "authentication", description = "Magic-link login and sessions"),
        (name = "users", description = "User profiles and data sync"),
    )
)]
pub struct ApiDoc;
