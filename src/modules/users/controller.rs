use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use usergate_auth::{IdentityClaims, Role};
use usergate_core::ApiResponse;

use crate::middleware::auth::Authenticated;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl From<&IdentityClaims> for ProfileResponse {
    fn from(claims: &IdentityClaims) -> Self {
        Self {
            user_id: claims.sub().to_string(),
            email: claims.email().to_string(),
            role: claims.role(),
            expires_at: claims.expires_at(),
        }
    }
}

/// Identity of the caller (any role)
#[instrument(skip_all)]
pub async fn get_profile(
    Authenticated(claims): Authenticated,
) -> Json<ApiResponse<ProfileResponse>> {
    Json(ApiResponse::ok(
        "Profile retrieved successfully",
        ProfileResponse::from(&claims),
    ))
}

/// Identity of the caller (admins only)
#[instrument(skip_all)]
pub async fn get_admin_overview(
    Authenticated(claims): Authenticated,
) -> Json<ApiResponse<ProfileResponse>> {
    Json(ApiResponse::ok(
        "Admin access granted",
        ProfileResponse::from(&claims),
    ))
}
