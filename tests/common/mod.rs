#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use usergate::router::init_router;
use usergate::state::AppState;
use usergate_auth::{Role, TokenCodec, TokenSubject};
use usergate_config::{CorsConfig, JwtConfig, RateLimitConfig, ServerConfig, UploadConfig};

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-chars";
pub const BOUNDARY: &str = "usergate-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    /// Upload root; removed when the app is dropped.
    pub upload_dir: TempDir,
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: TEST_SECRET.to_string(),
        access_token_expiry: Duration::from_secs(3600),
    }
}

pub fn setup_test_app() -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();

    let state = AppState::new(
        &jwt_config(),
        // Requests in tests carry no peer address, so clients are keyed by
        // X-Forwarded-For as they would be behind a proxy.
        RateLimitConfig {
            trust_forwarded_headers: true,
            ..RateLimitConfig::default()
        },
        UploadConfig {
            root: upload_dir.path().to_path_buf(),
            io_timeout: Duration::from_secs(10),
        },
        CorsConfig::default(),
        ServerConfig::default(),
    );
    let router = init_router(state.clone(), None).unwrap();

    TestApp {
        router,
        state,
        upload_dir,
    }
}

pub fn token_for(role: Role) -> String {
    let email = format!("{}@example.com", role);
    TokenCodec::from_config(&jwt_config())
        .sign(&TokenSubject::new("64f0c2a1b3", email, role))
        .unwrap()
}

pub fn expired_token(role: Role) -> String {
    let now = Utc::now();
    TokenCodec::from_config(&jwt_config())
        .sign_at(
            &TokenSubject::new("64f0c2a1b3", "expired@example.com", role),
            now - chrono::Duration::hours(2),
            now - chrono::Duration::seconds(1),
        )
        .unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Send `request` and decode the JSON body (`Value::Null` when empty).
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

/// A multipart part: field name, optional file name, bytes.
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(name: &'a str, file_name: &'a str, content: &'a [u8]) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            content,
        }
    }

    pub fn text(name: &'a str, content: &'a str) -> Self {
        Self {
            name,
            file_name: None,
            content: content.as_bytes(),
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    part.name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                    .as_bytes(),
            ),
        }
        body.extend_from_slice(part.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload(uri: &str, auth: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

/// Smallest byte string that sniffs as PNG.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0u8; 32]);
    bytes
}

/// Windows executable header.
pub fn exe_bytes() -> Vec<u8> {
    let mut bytes = b"MZ\x90\x00\x03\x00\x00\x00".to_vec();
    bytes.extend_from_slice(&[0u8; 56]);
    bytes
}

/// Regular files (not directories) anywhere under `dir`.
pub fn stored_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(stored_files(&path));
        } else {
            found.push(path);
        }
    }
    found
}
