mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{bearer, send, setup_test_app, token_for};
use usergate_auth::Role;

fn admin_request(client: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri("/api/v1/users/admin")
        .header("x-forwarded-for", client);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

// Paused clock: no tokens are refilled between requests unless time is
// advanced explicitly.
#[tokio::test(start_paused = true)]
async fn test_moderate_burst_then_limit_exceeded() {
    let app = setup_test_app();

    // Rate limiting runs first, so unauthenticated requests still spend tokens.
    for i in 0..20 {
        let (status, _) = send(&app.router, admin_request("203.0.113.9", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "request {}", i + 1);
    }

    let (status, body) = send(&app.router, admin_request("203.0.113.9", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "LimitExceeded");
    assert_eq!(body["message"], "Rate limit exceeded. Please try again later.");

    // A valid token does not bypass the limit.
    let token = bearer(&token_for(Role::Admin));
    let (status, _) = send(&app.router, admin_request("203.0.113.9", Some(&token))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test(start_paused = true)]
async fn test_clients_are_limited_independently() {
    let app = setup_test_app();

    for _ in 0..20 {
        send(&app.router, admin_request("203.0.113.9", None)).await;
    }
    let (status, _) = send(&app.router, admin_request("203.0.113.9", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = send(&app.router, admin_request("198.51.100.4", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(start_paused = true)]
async fn test_forwarded_for_uses_first_entry() {
    let app = setup_test_app();

    for _ in 0..20 {
        send(&app.router, admin_request("203.0.113.9, 10.0.0.1", None)).await;
    }

    // Same originating client behind a different proxy chain.
    let (status, _) = send(&app.router, admin_request("203.0.113.9, 10.0.0.2", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test(start_paused = true)]
async fn test_tokens_refill_over_time() {
    let app = setup_test_app();

    for _ in 0..20 {
        send(&app.router, admin_request("203.0.113.9", None)).await;
    }
    let (status, _) = send(&app.router, admin_request("203.0.113.9", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Moderate refills 10 tokens per second.
    tokio::time::advance(Duration::from_millis(150)).await;
    let (status, _) = send(&app.router, admin_request("203.0.113.9", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, admin_request("203.0.113.9", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test(start_paused = true)]
async fn test_named_class_budget_is_shared_across_routes() {
    let app = setup_test_app();
    let token = bearer(&token_for(Role::Admin));

    // /users/admin and /files/upload are both moderate.
    for _ in 0..20 {
        send(&app.router, admin_request("203.0.113.9", Some(&token))).await;
    }

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/files/upload")
        .header("x-forwarded-for", "203.0.113.9")
        .header("authorization", token.as_str())
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "LimitExceeded");
}
