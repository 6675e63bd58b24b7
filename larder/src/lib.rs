//! # larder: Recipe Suggestion Service
//!
//! `larder` is the backend for an ingredient-driven recipe suggestion app:
//! clients send the ingredients they have on hand, and the service asks a
//! hosted LLM provider for recipe ideas, returned either as freeform text
//! (optionally streamed) or as a schema-constrained JSON document. Around
//! that core sit passwordless accounts: magic-link email login, 30-day
//! sessions, encrypted per-user storage of a provider API key, and syncing
//! of a user's ingredient list and dietary preference across devices.
//!
//! ## Architecture
//!
//! The HTTP layer is built on [Axum](https://github.com/tokio-rs/axum). All
//! durable state lives behind the narrow [`kv::KvStore`] trait; the default
//! [`kv::MemoryKv`] keeps everything in process memory with TTL semantics,
//! and every store-backed component (users, magic links, sessions, the
//! durable login rate limiter) goes through that seam.
//!
//! ### Request Flow
//!
//! A recipe request is throttled per client identifier (in-memory fixed
//! window), validated, and matched with an API key - the request's own
//! `X-Api-Key` header, the authenticated user's stored key (decrypted on the
//! fly), or the configured server fallback, in that order. The sanitized
//! prompt then goes to the provider through [`llm::LlmClient`]; with
//! `Accept: text/event-stream` the completion is relayed to the client as raw
//! text fragments as they arrive.
//!
//! Login requests are throttled by a durable counter, then a one-time token
//! (15-minute expiry) is mailed to the address; visiting the link consumes
//! the token and establishes a signed session cookie that is also persisted
//! server-side so logout and account deletion can revoke it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use larder::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = larder::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     larder::telemetry::init_telemetry();
//!
//!     let app = Application::new(config)?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod email;
pub mod errors;
pub mod kv;
pub mod limits;
pub mod llm;
pub mod openapi;
pub mod prompts;
pub mod schemas;
pub mod telemetry;
pub mod users;

pub use config::Config;
pub use errors::{Error, Result};

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::auth::{MagicLinkStore, SessionStore};
use crate::crypto::SecretCipher;
use crate::email::EmailService;
use crate::kv::{KvStore, MemoryKv};
use crate::limits::{KvRateLimiter, MemoryRateLimiter};
use crate::llm::LlmClient;
use crate::users::UserStore;

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub kv: Arc<dyn KvStore>,
    pub users: UserStore,
    pub magic_links: MagicLinkStore,
    pub sessions: SessionStore,
    pub api_limiter: Arc<MemoryRateLimiter>,
    pub auth_limiter: Arc<KvRateLimiter>,
    pub llm: LlmClient,
    pub email: Option<Arc<EmailService>>,
}

impl AppState {
    /// Wires every component to the given store. The config must already be
    /// validated; missing secrets are a startup error here, never a silent
    /// fallback.
    pub fn new(config: Config, kv: Arc<dyn KvStore>) -> Result<Self> {
        config.validate()?;

        let secret_key = config.secret_key.clone().ok_or(Error::Internal {
            operation: "read secret_key from config".to_string(),
        })?;
        let encryption_key = config.encryption_key.clone().ok_or(Error::Internal {
            operation: "read encryption_key from config".to_string(),
        })?;

        let email = match &config.email {
            Some(email_config) => Some(Arc::new(EmailService::new(email_config)?)),
            None => None,
        };

        Ok(Self {
            users: UserStore::new(kv.clone(), SecretCipher::new(&encryption_key)),
            magic_links: MagicLinkStore::new(kv.clone()),
            sessions: SessionStore::new(kv.clone(), secret_key),
            api_limiter: Arc::new(MemoryRateLimiter::new(&config.rate_limits.api)),
            auth_limiter: Arc::new(KvRateLimiter::new("auth", &config.rate_limits.auth, kv.clone())),
            llm: LlmClient::new(&config.llm)?,
            email,
            config: Arc::new(config),
            kv,
        })
    }
}

fn create_cors_layer(config: &Config) -> Result<CorsLayer> {
    let cors_config = &config.cors;

    // Wildcard origins cannot be combined with credentials
    if cors_config.allowed_origins.iter().any(|origin| origin == "*") {
        return Ok(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));
    }

    let mut origins = Vec::new();
    for origin in &cors_config.allowed_origins {
        origins.push(origin.parse::<HeaderValue>().map_err(|e| Error::Internal {
            operation: format!("parse CORS origin {origin:?}: {e}"),
        })?);
    }

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(cors_config.allow_credentials)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Build the application router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api", get(api::handlers::info::api_info))
        .route("/api/recipes", post(api::handlers::recipes::generate_recipes))
        .route("/api/auth/request-login", post(api::handlers::auth::request_login))
        .route("/api/auth/verify", get(api::handlers::auth::verify_login))
        .route("/api/auth/logout", post(api::handlers::auth::logout))
        .route(
            "/api/user",
            get(api::handlers::users::get_profile)
                .put(api::handlers::users::update_profile)
                .delete(api::handlers::users::delete_account),
        )
        .route("/api/user/sync", post(api::handlers::users::sync_profile))
        .with_state(state)
        .merge(Scalar::with_url("/api/docs", openapi::ApiDoc::openapi()))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// The assembled service: state, router, and the listener lifecycle.
pub struct Application {
    router: Router,
    config: Arc<Config>,
}

impl Application {
    /// Create an application backed by the in-process store.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_store(config, Arc::new(MemoryKv::new()))
    }

    /// Create an application backed by a caller-supplied store.
    pub fn with_store(config: Config, kv: Arc<dyn KvStore>) -> Result<Self> {
        let state = AppState::new(config, kv)?;
        let config = state.config.clone();
        let router = build_router(state)?;
        Ok(Self { router, config })
    }

    /// Start serving, resolving when `shutdown` completes and in-flight
    /// requests have drained.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Larder listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutdown complete");
        Ok(())
    }
}
