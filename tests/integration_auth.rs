mod common;

use axum::http::StatusCode;
use common::{bearer, expired_token, get, send, setup_test_app, token_for};
use usergate_auth::{Role, TokenCodec, TokenSubject};

#[tokio::test]
async fn test_health_is_not_gated() {
    let app = setup_test_app();

    let (status, body) = send(&app.router, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Service is running");
    assert_eq!(body["data"]["status"], "OK");
    assert!(body["data"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_missing_authorization_header() {
    let app = setup_test_app();

    let (status, body) = send(&app.router, get("/api/v1/users/profile", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["message"], "Authorization header is required");
}

#[tokio::test]
async fn test_wrong_scheme_is_rejected() {
    let app = setup_test_app();
    let token = token_for(Role::User);

    let (status, body) = send(
        &app.router,
        get("/api/v1/users/profile", Some(&format!("Basic {token}"))),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid authorization header");
}

#[tokio::test]
async fn test_token_failures_share_one_message() {
    let app = setup_test_app();
    let foreign = TokenCodec::new(
        b"some-other-secret-that-is-long-enough",
        std::time::Duration::from_secs(3600),
    )
    .sign(&TokenSubject::new("64f0c2a1b3", "user@example.com", Role::Admin))
    .unwrap();

    for token in [
        "not-a-token".to_string(),
        foreign,
        expired_token(Role::Admin),
    ] {
        let (status, body) = send(
            &app.router,
            get("/api/v1/users/profile", Some(&bearer(&token))),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "Invalid or expired token");
    }
}

#[tokio::test]
async fn test_profile_returns_caller_claims() {
    let app = setup_test_app();

    let (status, body) = send(
        &app.router,
        get("/api/v1/users/profile", Some(&bearer(&token_for(Role::User)))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user_id"], "64f0c2a1b3");
    assert_eq!(body["data"]["email"], "user@example.com");
    assert_eq!(body["data"]["role"], "user");
}

#[tokio::test]
async fn test_admin_route_allows_admin() {
    let app = setup_test_app();

    let (status, body) = send(
        &app.router,
        get("/api/v1/users/admin", Some(&bearer(&token_for(Role::Admin)))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");
}

#[tokio::test]
async fn test_admin_route_forbids_user() {
    let app = setup_test_app();

    let (status, body) = send(
        &app.router,
        get("/api/v1/users/admin", Some(&bearer(&token_for(Role::User)))),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Forbidden");
    assert_eq!(body["message"], "Insufficient permissions");
}

#[tokio::test]
async fn test_authentication_runs_before_authorization() {
    let app = setup_test_app();

    let (status, body) = send(&app.router, get("/api/v1/users/admin", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[cfg(feature = "observability")]
#[tokio::test]
async fn test_rejections_carry_request_id() {
    let app = setup_test_app();

    let response = tower::ServiceExt::oneshot(app.router.clone(), get("/api/v1/users/profile", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("x-request-id"));
}
