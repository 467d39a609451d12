//! Shared test harness: an app wired to the in-memory store, a recording
//! mailer, and a manual clock, driven through the router with oneshot
//! requests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;
use uuid::Uuid;

use fakturo::ratelimit::{LocalCounterStore, RateLimitConfig, RateLimiter};
use fakturo::store::InMemoryStore;
use fakturo::testing::{ManualClock, RecordingMailer};
use fakturo::{App, AppContext, ConfigBuilder};

pub const TEST_SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub clock: Arc<ManualClock>,
    pub user_id: Uuid,
    pub token: String,
}

pub fn test_app() -> TestApp {
    test_app_with_rate_limit(RateLimitConfig::default())
}

/// Build a test app. When the config names a Redis URL the limiter uses it
/// as primary (with the manual-clock local store as fallback); otherwise
/// counters are local only.
pub fn test_app_with_rate_limit(rate_limit: RateLimitConfig) -> TestApp {
    let config = ConfigBuilder::new()
        .with_rate_limit(rate_limit.clone())
        .with_jwt_secret(TEST_SECRET)
        .build()
        .expect("test config");

    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(RecordingMailer::new());
    let clock = Arc::new(ManualClock::new());

    let primary = rate_limit.redis_url.as_deref().map(|url| {
        Arc::new(fakturo::ratelimit::RedisCounterStore::new(url).expect("redis client"))
            as Arc<dyn fakturo::ratelimit::CounterStore>
    });
    let rate_limiter = Arc::new(RateLimiter::with_stores(
        rate_limit.limit,
        rate_limit.window(),
        primary,
        Arc::new(LocalCounterStore::new(clock.clone())),
    ));

    let context = AppContext::builder()
        .with_config(config)
        .with_store(store.clone())
        .with_mailer(mailer.clone())
        .with_rate_limiter(rate_limiter)
        .build()
        .expect("test context");

    let user_id = Uuid::new_v4();
    let token = fakturo::auth::issue_token(TEST_SECRET, user_id, Duration::from_secs(3600))
        .expect("test token");

    let router = App::new(context)
        .router()
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 41234))));

    TestApp {
        router,
        store,
        mailer,
        clock,
        user_id,
        token,
    }
}

/// Issue a JSON request and parse the JSON response (Null for empty
/// bodies).
pub async fn request(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    request_raw(app, method, uri, Some(&app.token), body.to_string()).await
}

/// Same as [`request`] but without an Authorization header.
pub async fn request_unauthenticated(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    request_raw(app, method, uri, None, body.to_string()).await
}

pub async fn request_raw(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: String,
) -> (StatusCode, serde_json::Value) {
    // oneshot skips the wire, so declare the length the way a real client
    // would; the payload guard reads it.
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("content-length", body.len());
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = builder.body(Body::from(body)).expect("request");

    let response = app.router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// The error code from a structured error response.
pub fn error_code(body: &serde_json::Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("")
}

/// A minimal valid `/api/email` body for the given sender identity.
pub fn email_body(sender_identity_id: Uuid) -> serde_json::Value {
    serde_json::json!({
        "to": "billing@acme.example",
        "subject": "Your invoice",
        "message": "Please find the invoice attached.",
        "pdfBase64": "JVBERi0xLjcgZmFrZQ==",
        "filename": "invoice.pdf",
        "senderIdentityId": sender_identity_id,
    })
}
