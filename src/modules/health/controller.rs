use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use usergate_core::ApiResponse;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Liveness probe. Not gated.
pub async fn health_check() -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::ok(
        "Service is running",
        HealthStatus {
            status: "OK",
            timestamp: Utc::now(),
        },
    ))
}
