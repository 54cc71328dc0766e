use axum::{Router, routing::get};

use usergate_auth::Role;
use usergate_config::RateClass;

use crate::middleware::pipeline::{Pipeline, PipelineError};
use crate::modules::users::controller::{get_admin_overview, get_profile};
use crate::state::AppState;

pub fn init_users_router(state: &AppState) -> Result<Router<AppState>, PipelineError> {
    let profile = Pipeline::builder(state)
        .rate_limit(RateClass::Lenient)
        .authenticate()
        .build()?;

    let admin = Pipeline::builder(state)
        .rate_limit(RateClass::Moderate)
        .authenticate()
        .authorize([Role::Admin])
        .build()?;

    Ok(Router::new()
        .merge(profile.apply(Router::new().route("/profile", get(get_profile))))
        .merge(admin.apply(Router::new().route("/admin", get(get_admin_overview)))))
}
