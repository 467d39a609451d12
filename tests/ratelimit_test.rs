//! Rate limiting behavior through the HTTP surface.
//!
//! Covers the threshold boundary, window reset with a manual clock,
//! per-client isolation, and fallback-mode enforcement when the shared
//! counter store is unreachable.

mod common;
use common::*;

use std::time::Duration;

use axum::http::StatusCode;
use fakturo::ratelimit::RateLimitConfig;
use fakturo::testing::fixtures;

#[tokio::test]
async fn test_limit_boundary_is_inclusive() {
    let app = test_app_with_rate_limit(RateLimitConfig::builder().limit(10).window_ms(60_000).build());
    let identity = fixtures::seed_identity(&app.store, app.user_id).await;

    for i in 1..=10 {
        let (status, body) = request(&app, "POST", "/api/email", email_body(identity.id)).await;
        assert_eq!(status, StatusCode::OK, "request {} should pass: {}", i, body);
    }

    let (status, body) = request(&app, "POST", "/api/email", email_body(identity.id)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_code(&body), "RATE_LIMIT");
    assert!(
        body["error"]["retryAfterSeconds"].as_u64().unwrap() >= 1,
        "429 must carry a numeric retryAfterSeconds"
    );

    // 10 provider calls happened, the 11th request never reached the mailer
    assert_eq!(app.mailer.call_count(), 10);
}

#[tokio::test]
async fn test_window_reset_allows_requests_again() {
    let app = test_app_with_rate_limit(RateLimitConfig::builder().limit(2).window_ms(1_000).build());
    let identity = fixtures::seed_identity(&app.store, app.user_id).await;

    let (status, _) = request(&app, "POST", "/api/email", email_body(identity.id)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = request(&app, "POST", "/api/email", email_body(identity.id)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(&app, "POST", "/api/email", email_body(identity.id)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_code(&body), "RATE_LIMIT");

    app.clock.advance(Duration::from_millis(1_100));

    let (status, _) = request(&app, "POST", "/api/email", email_body(identity.id)).await;
    assert_eq!(status, StatusCode::OK, "a fresh window must admit requests");
}

#[tokio::test]
async fn test_unreachable_store_falls_back_with_same_thresholds() {
    // Nothing listens on port 1; every Redis attempt fails and the local
    // fallback enforces the limit instead.
    let app = test_app_with_rate_limit(
        RateLimitConfig::builder()
            .limit(2)
            .window_ms(60_000)
            .redis_url("redis://127.0.0.1:1/")
            .build(),
    );
    let identity = fixtures::seed_identity(&app.store, app.user_id).await;

    let (status, _) = request(&app, "POST", "/api/email", email_body(identity.id)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = request(&app, "POST", "/api/email", email_body(identity.id)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(&app, "POST", "/api/email", email_body(identity.id)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_code(&body), "RATE_LIMIT");
}

#[tokio::test]
async fn test_clients_have_separate_buckets_behind_trusted_proxy() {
    let app = test_app_with_rate_limit(
        RateLimitConfig::builder()
            .limit(1)
            .window_ms(60_000)
            .trust_proxy(true)
            .build(),
    );
    let identity = fixtures::seed_identity(&app.store, app.user_id).await;

    let send_from = |ip: &'static str| {
        let app_router = app.router.clone();
        let token = app.token.clone();
        let body = email_body(identity.id).to_string();
        async move {
            use tower::ServiceExt;
            let request = axum::http::Request::builder()
                .method("POST")
                .uri("/api/email")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", token))
                .header("x-forwarded-for", ip)
                .body(axum::body::Body::from(body))
                .unwrap();
            app_router.oneshot(request).await.unwrap().status()
        }
    };

    assert_eq!(send_from("203.0.113.7").await, StatusCode::OK);
    assert_eq!(send_from("203.0.113.7").await, StatusCode::TOO_MANY_REQUESTS);
    // a different client is unaffected
    assert_eq!(send_from("203.0.113.8").await, StatusCode::OK);
}

#[tokio::test]
async fn test_health_unaffected_by_exhausted_limiter() {
    let app = test_app_with_rate_limit(RateLimitConfig::builder().limit(1).window_ms(60_000).build());
    let identity = fixtures::seed_identity(&app.store, app.user_id).await;

    request(&app, "POST", "/api/email", email_body(identity.id)).await;
    let (status, _) = request(&app, "POST", "/api/email", email_body(identity.id)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, body) = request_raw(&app, "GET", "/health", None, String::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}
