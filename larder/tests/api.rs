//! End-to-end tests over the assembled router: recipe generation against a
//! mocked provider, the full magic-link login flow, profile sync, and rate
//! limiting.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header as mock_header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use larder::auth::magic_link::MagicLinkRecord;
use larder::config::{Config, EmailConfig, EmailTransportConfig};
use larder::kv::{self, keys, MemoryKv};
use larder::{build_router, AppState};

struct TestApp {
    server: TestServer,
    kv: Arc<MemoryKv>,
    _emails: TempDir,
}

fn test_config(llm_base_url: &str, email_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.secret_key = Some("test-signing-secret".to_string());
    config.encryption_key = Some("test-cipher-secret".to_string());
    config.base_url = "http://localhost:3000".to_string();
    config.llm.base_url = llm_base_url.to_string();
    config.email = Some(EmailConfig {
        from_email: "noreply@example.com".to_string(),
        from_name: "Larder".to_string(),
        transport: EmailTransportConfig::File {
            path: email_dir.path().to_string_lossy().to_string(),
        },
    });
    config
}

fn spawn_app_with(config: Config) -> (TestServer, Arc<MemoryKv>) {
    let kv = Arc::new(MemoryKv::new());
    let state = AppState::new(config, kv.clone()).expect("state should build");
    let router = build_router(state).expect("router should build");
    (TestServer::new(router).expect("test server should start"), kv)
}

async fn spawn_app(llm: &MockServer) -> TestApp {
    let emails = TempDir::new().expect("tempdir");
    let config = test_config(&llm.uri(), &emails);
    let (server, kv) = spawn_app_with(config);
    TestApp { server, kv, _emails: emails }
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn structured_content() -> String {
    json!({
        "recipes": [
            {"name": "Pancakes", "description": "Classic fluffy pancakes."},
            {"name": "Omelette", "description": "A quick three-egg omelette."},
            {"name": "Crepes", "description": "Thin and delicate."}
        ]
    })
    .to_string()
}

fn api_key_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_static("gsk_request_key"),
    )
}

#[test_log::test(tokio::test)]
async fn recipes_structured_response_with_rate_limit_headers() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(mock_header("authorization", "Bearer gsk_request_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(&structured_content())))
        .expect(1)
        .mount(&llm)
        .await;

    let app = spawn_app(&llm).await;
    let (name, value) = api_key_header();
    let response = app
        .server
        .post("/api/recipes")
        .add_header(name, value)
        .json(&json!({"items": ["eggs", "flour", "milk"]}))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("x-ratelimit-limit"), "10");
    assert_eq!(response.header("x-ratelimit-remaining"), "9");

    let body: serde_json::Value = response.json();
    let recipes = body["recipes"].as_array().expect("recipes array");
    assert_eq!(recipes.len(), 3);
    for recipe in recipes {
        assert!(!recipe["name"].as_str().unwrap().is_empty());
        assert!(!recipe["description"].as_str().unwrap().is_empty());
        assert!(recipe.get("steps").is_none());
    }
}

#[test_log::test(tokio::test)]
async fn recipes_text_format_returns_freeform_string() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("1. Pancakes - fluffy.")))
        .mount(&llm)
        .await;

    let app = spawn_app(&llm).await;
    let (name, value) = api_key_header();
    let response = app
        .server
        .post("/api/recipes")
        .add_header(name, value)
        .json(&json!({"items": ["eggs"], "format": "text"}))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["recipes"], "1. Pancakes - fluffy.");
}

#[test_log::test(tokio::test)]
async fn recipes_streaming_relays_fragments() {
    let llm = MockServer::start().await;
    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Pan\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"cakes\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse),
        )
        .mount(&llm)
        .await;

    let app = spawn_app(&llm).await;
    let (name, value) = api_key_header();
    let response = app
        .server
        .post("/api/recipes")
        .add_header(name, value)
        .add_header(
            HeaderName::from_static("accept"),
            HeaderValue::from_static("text/event-stream"),
        )
        .json(&json!({"items": ["eggs"]}))
        .await;

    response.assert_status_ok();
    assert_eq!(response.text(), "Pancakes");
}

#[test_log::test(tokio::test)]
async fn recipes_without_any_key_is_unauthorized() {
    let llm = MockServer::start().await;
    let app = spawn_app(&llm).await;

    let response = app.server.post("/api/recipes").json(&json!({"items": ["eggs"]})).await;

    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "API_KEY_MISSING");
}

#[test_log::test(tokio::test)]
async fn recipes_missing_key_reported_before_validation() {
    // An invalid payload with no key resolves the key first: 401, not 400
    let llm = MockServer::start().await;
    let app = spawn_app(&llm).await;

    let response = app.server.post("/api/recipes").json(&json!({"items": []})).await;

    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "API_KEY_MISSING");
}

#[test_log::test(tokio::test)]
async fn recipes_validation_failure_names_field() {
    let llm = MockServer::start().await;
    let app = spawn_app(&llm).await;
    let (name, value) = api_key_header();

    let response = app
        .server
        .post("/api/recipes")
        .add_header(name, value)
        .json(&json!({"items": []}))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"], "Invalid request data");
    assert!(body["details"].as_str().unwrap().contains("items"));
}

#[test_log::test(tokio::test)]
async fn recipes_rate_limit_denies_with_retry_after() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(&structured_content())))
        .mount(&llm)
        .await;

    let emails = TempDir::new().unwrap();
    let mut config = test_config(&llm.uri(), &emails);
    config.rate_limits.api.limit = 3;
    config.rate_limits.api.window = Duration::from_secs(60);
    let (server, _kv) = spawn_app_with(config);

    for _ in 0..3 {
        let (name, value) = api_key_header();
        let response = server
            .post("/api/recipes")
            .add_header(name, value)
            .json(&json!({"items": ["eggs"]}))
            .await;
        response.assert_status_ok();
    }

    let (name, value) = api_key_header();
    let denied = server
        .post("/api/recipes")
        .add_header(name, value)
        .json(&json!({"items": ["eggs"]}))
        .await;

    denied.assert_status(axum::http::StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = denied.json();
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(denied.header("x-ratelimit-remaining"), "0");
    assert!(denied.header("retry-after").to_str().unwrap().parse::<i64>().unwrap() >= 0);
}

#[test_log::test(tokio::test)]
async fn upstream_rejected_key_maps_to_unauthorized() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "invalid key"}})))
        .mount(&llm)
        .await;

    let app = spawn_app(&llm).await;
    let (name, value) = api_key_header();
    let response = app
        .server
        .post("/api/recipes")
        .add_header(name, value)
        .json(&json!({"items": ["eggs"]}))
        .await;

    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Invalid API key");
}

async fn seed_magic_link(kv: &MemoryKv, token: &str, email: &str) {
    let now = Utc::now();
    let record = MagicLinkRecord {
        email: email.to_string(),
        created_at: now,
        expires_at: now + chrono::Duration::minutes(15),
    };
    kv::set_typed(kv, &[keys::MAGIC_LINK, token], &record, None)
        .await
        .expect("seed magic link");
}

fn session_cookie_from(response: &axum_test::TestResponse) -> (HeaderName, HeaderValue) {
    let set_cookie = response.header("set-cookie");
    let cookie_pair = set_cookie
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    (
        HeaderName::from_static("cookie"),
        HeaderValue::from_str(&cookie_pair).unwrap(),
    )
}

#[test_log::test(tokio::test)]
async fn login_flow_establishes_session_and_profile_access() {
    let llm = MockServer::start().await;
    let app = spawn_app(&llm).await;

    // Request a login link; the account is created on first sight
    let response = app
        .server
        .post("/api/auth/request-login")
        .json(&json!({"email": "cook@example.com"}))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(response.header("x-ratelimit-limit"), "5");

    // Visit a seeded magic link
    seed_magic_link(&app.kv, "seeded-token", "cook@example.com").await;
    let verify = app.server.get("/api/auth/verify?token=seeded-token").await;
    verify.assert_status(axum::http::StatusCode::FOUND);
    assert_eq!(verify.header("location"), "/?login=success");

    let cookie = session_cookie_from(&verify);
    let profile = app
        .server
        .get("/api/user")
        .add_header(cookie.0.clone(), cookie.1.clone())
        .await;
    profile.assert_status_ok();
    let profile: serde_json::Value = profile.json();
    assert_eq!(profile["email"], "cook@example.com");
    assert_eq!(profile["has_api_key"], false);

    // The link is single use
    let reuse = app.server.get("/api/auth/verify?token=seeded-token").await;
    assert_eq!(reuse.header("location"), "/?error=invalid_or_expired_link");
}

#[test_log::test(tokio::test)]
async fn verify_rejects_missing_and_unknown_tokens() {
    let llm = MockServer::start().await;
    let app = spawn_app(&llm).await;

    let missing = app.server.get("/api/auth/verify").await;
    missing.assert_status_bad_request();

    let unknown = app.server.get("/api/auth/verify?token=deadbeef").await;
    unknown.assert_status(axum::http::StatusCode::FOUND);
    assert_eq!(unknown.header("location"), "/?error=invalid_or_expired_link");
}

#[test_log::test(tokio::test)]
async fn login_request_with_invalid_email_is_rejected() {
    let llm = MockServer::start().await;
    let app = spawn_app(&llm).await;

    let response = app
        .server
        .post("/api/auth/request-login")
        .json(&json!({"email": "not-an-email"}))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

async fn login(app: &TestApp, email: &str) -> (HeaderName, HeaderValue) {
    let token = format!("tok-{email}");
    seed_magic_link(&app.kv, &token, email).await;
    let verify = app.server.get(&format!("/api/auth/verify?token={token}")).await;
    session_cookie_from(&verify)
}

#[test_log::test(tokio::test)]
async fn profile_update_and_sync_round_trip() {
    let llm = MockServer::start().await;
    // The stored key is used when no header key is supplied
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(mock_header("authorization", "Bearer gsk_stored_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(&structured_content())))
        .expect(1)
        .mount(&llm)
        .await;

    let app = spawn_app(&llm).await;
    let cookie = login(&app, "cook@example.com").await;

    // Sync pantry state and store an API key
    let sync = app
        .server
        .post("/api/user/sync")
        .add_header(cookie.0.clone(), cookie.1.clone())
        .json(&json!({"items": ["eggs", "rice"], "dietary": "vegetarian", "api_key": "gsk_stored_key"}))
        .await;
    sync.assert_status_ok();
    let body: serde_json::Value = sync.json();
    assert_eq!(body["message"], "Data synced successfully");
    assert_eq!(body["profile"]["items"], json!(["eggs", "rice"]));
    assert_eq!(body["profile"]["dietary"], "vegetarian");
    assert_eq!(body["profile"]["has_api_key"], true);

    // The raw key never appears in any profile payload
    assert!(!body.to_string().contains("gsk_stored_key"));

    // Recipe generation picks up the stored key
    let recipes = app
        .server
        .post("/api/recipes")
        .add_header(cookie.0.clone(), cookie.1.clone())
        .json(&json!({"items": ["eggs"]}))
        .await;
    recipes.assert_status_ok();

    // Empty string removes the key
    let update = app
        .server
        .put("/api/user")
        .add_header(cookie.0.clone(), cookie.1.clone())
        .json(&json!({"api_key": "", "dietary": "vegan"}))
        .await;
    update.assert_status_ok();
    let body: serde_json::Value = update.json();
    assert_eq!(body["profile"]["has_api_key"], false);
    assert_eq!(body["profile"]["dietary"], "vegan");
    // Items are untouched by profile updates
    assert_eq!(body["profile"]["items"], json!(["eggs", "rice"]));
}

#[test_log::test(tokio::test)]
async fn profile_requires_authentication() {
    let llm = MockServer::start().await;
    let app = spawn_app(&llm).await;

    let response = app.server.get("/api/user").await;
    response.assert_status_unauthorized();

    let sync = app.server.post("/api/user/sync").json(&json!({"items": []})).await;
    sync.assert_status_unauthorized();
}

#[test_log::test(tokio::test)]
async fn logout_revokes_the_session() {
    let llm = MockServer::start().await;
    let app = spawn_app(&llm).await;
    let cookie = login(&app, "cook@example.com").await;

    let logout = app
        .server
        .post("/api/auth/logout")
        .add_header(cookie.0.clone(), cookie.1.clone())
        .await;
    logout.assert_status_ok();
    assert!(logout.header("set-cookie").to_str().unwrap().contains("Max-Age=0"));

    // The JWT is still well formed, but the revocation record is gone
    let after = app
        .server
        .get("/api/user")
        .add_header(cookie.0.clone(), cookie.1.clone())
        .await;
    after.assert_status_unauthorized();

    // Logging out without a cookie is a 401
    let no_cookie = app.server.post("/api/auth/logout").await;
    no_cookie.assert_status_unauthorized();
}

#[test_log::test(tokio::test)]
async fn account_deletion_cascades_to_session() {
    let llm = MockServer::start().await;
    let app = spawn_app(&llm).await;
    let cookie = login(&app, "cook@example.com").await;

    // The verify step creates no user record; request-login does
    app.server
        .post("/api/auth/request-login")
        .json(&json!({"email": "cook@example.com"}))
        .await
        .assert_status_ok();

    let delete = app
        .server
        .delete("/api/user")
        .add_header(cookie.0.clone(), cookie.1.clone())
        .await;
    delete.assert_status_ok();

    let after = app
        .server
        .get("/api/user")
        .add_header(cookie.0.clone(), cookie.1.clone())
        .await;
    after.assert_status_unauthorized();
}

#[test_log::test(tokio::test)]
async fn api_info_is_cacheable() {
    let llm = MockServer::start().await;
    let app = spawn_app(&llm).await;

    let response = app.server.get("/api").await;
    response.assert_status_ok();
    assert_eq!(response.header("cache-control"), "public, max-age=3600");

    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], "Larder API");
    let endpoints = body["endpoints"].as_array().unwrap();
    assert!(endpoints.iter().any(|e| e["path"] == "/api/recipes"
        && e["rate_limit"] == "10 requests per minute per client"));
}
