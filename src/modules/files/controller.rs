use axum::Json;
use serde::Serialize;
use tracing::{info, instrument};

use usergate_core::{ApiResponse, StoredFileRecord};

use crate::middleware::auth::Authenticated;
use crate::middleware::pipeline::UploadedFiles;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub files: Vec<StoredFileRecord>,
    pub count: usize,
}

/// Shared by every upload route; the route's pipeline decides what is
/// accepted and where it is stored.
#[instrument(skip_all)]
pub async fn upload_files(
    Authenticated(claims): Authenticated,
    UploadedFiles(files): UploadedFiles,
) -> Json<ApiResponse<UploadResponse>> {
    info!(sub = claims.sub(), count = files.len(), "Files uploaded");

    let count = files.len();
    Json(ApiResponse::ok(
        "File(s) uploaded successfully",
        UploadResponse { files, count },
    ))
}
