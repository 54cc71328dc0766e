use axum::{Router, routing::post};

use usergate_config::RateClass;
use usergate_core::UploadConstraintSet;

use crate::middleware::pipeline::{Pipeline, PipelineError};
use crate::modules::files::controller::upload_files;
use crate::state::AppState;

/// Images accepted per request on `/upload/images`.
const MAX_IMAGES: usize = 5;

pub fn init_files_router(state: &AppState) -> Result<Router<AppState>, PipelineError> {
    let root = state.upload_config.root.as_path();

    let routes = [
        (
            "/upload",
            RateClass::Moderate,
            UploadConstraintSet::default_upload(root),
        ),
        (
            "/upload/image",
            RateClass::Strict,
            UploadConstraintSet::image_upload(root),
        ),
        (
            "/upload/document",
            RateClass::Moderate,
            UploadConstraintSet::document_upload(root),
        ),
        (
            "/upload/images",
            RateClass::Strict,
            UploadConstraintSet::multiple_image_upload(root, MAX_IMAGES),
        ),
    ];

    let mut router = Router::new();
    for (path, class, constraints) in routes {
        let pipeline = Pipeline::builder(state)
            .rate_limit(class)
            .authenticate()
            .upload(constraints)
            .build()?;
        router = router.merge(pipeline.apply(Router::new().route(path, post(upload_files))));
    }
    Ok(router)
}
