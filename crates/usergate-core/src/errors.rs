//! Application error type and response envelopes.
//!
//! Every rejection leaving the gatekeeper is rendered as
//!
//! ```json
//! { "success": false, "message": "...", "error": "Tag" }
//! ```
//!
//! where `error` is a stable, machine-readable tag and `message` is safe to
//! show to the client.

use anyhow::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

/// Machine-readable tags used in rejection bodies.
pub mod tags {
    pub const UNAUTHORIZED: &str = "Unauthorized";
    pub const FORBIDDEN: &str = "Forbidden";
    pub const LIMIT_EXCEEDED: &str = "LimitExceeded";
    pub const INVALID_FORM_DATA: &str = "InvalidFormData";
    pub const INTERNAL: &str = "InternalFailure";
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub tag: &'static str,
    pub error: Error,
}

impl AppError {
    pub fn new<E>(status: StatusCode, tag: &'static str, err: E) -> Self
    where
        E: Into<Error>,
    {
        Self {
            status,
            tag,
            error: err.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::from_message(StatusCode::UNAUTHORIZED, tags::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::from_message(StatusCode::FORBIDDEN, tags::FORBIDDEN, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::from_message(
            StatusCode::TOO_MANY_REQUESTS,
            tags::LIMIT_EXCEEDED,
            message,
        )
    }

    pub fn bad_request(tag: &'static str, message: impl Into<String>) -> Self {
        Self::from_message(StatusCode::BAD_REQUEST, tag, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::from_message(StatusCode::INTERNAL_SERVER_ERROR, tags::INTERNAL, message)
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, tags::INTERNAL, err)
    }

    fn from_message(status: StatusCode, tag: &'static str, message: impl Into<String>) -> Self {
        Self::new(status, tag, anyhow::anyhow!(message.into()))
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.status.as_u16(), self.tag, self.error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.error.to_string(),
            "error": self.tag,
        }));

        (self.status, body).into_response()
    }
}

/// Success envelope returned by handlers behind the gatekeeper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_status_and_tag() {
        let err = AppError::unauthorized("Invalid or expired token");
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.tag, "Unauthorized");

        let err = AppError::forbidden("Insufficient permissions");
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.tag, "Forbidden");

        let err = AppError::too_many_requests("slow down");
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.tag, "LimitExceeded");

        let err = AppError::internal_error("boom");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.tag, "InternalFailure");
    }

    #[test]
    fn test_message_is_preserved() {
        let err = AppError::bad_request("FileRequired", "File field 'file' is required");
        assert_eq!(err.message(), "File field 'file' is required");
        assert_eq!(err.to_string(), "[400] FileRequired: File field 'file' is required");
    }

    #[test]
    fn test_into_response_status() {
        let response = AppError::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_api_response_serializes_envelope() {
        let body = ApiResponse::ok("Service is running", json!({"status": "OK"}));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "Service is running");
        assert_eq!(value["data"]["status"], "OK");
    }
}
