use axum::http::{HeaderValue, Method, header};
use axum::{Router, middleware};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use usergate_config::CorsConfig;
use usergate_observability::{MetricsHandle, logging_middleware, metrics_app, metrics_middleware};

use crate::middleware::pipeline::PipelineError;
use crate::modules::files::router::init_files_router;
use crate::modules::health::router::init_health_router;
use crate::modules::users::router::init_users_router;
use crate::state::AppState;

/// Build the application router.
///
/// Fails when a route's pipeline is misconfigured, so a bad route set stops
/// the server at startup rather than on first request.
pub fn init_router(
    state: AppState,
    metrics: Option<MetricsHandle>,
) -> Result<Router, PipelineError> {
    let api = Router::new()
        .nest("/users", init_users_router(&state)?)
        .nest("/files", init_files_router(&state)?);

    let router = Router::new()
        .merge(init_health_router())
        .nest("/api/v1", api)
        .with_state(state.clone());

    let router = match metrics {
        Some(handle) => router.merge(metrics_app(handle)),
        None => router,
    };

    Ok(router
        .layer(TimeoutLayer::new(state.server_config.request_timeout))
        .layer(cors_layer(&state.cors_config))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware)))
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    // Credentials cannot be combined with a wildcard origin.
    if config.allows_any() {
        return layer.allow_origin(AllowOrigin::any());
    }

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    layer
        .allow_origin(allowed_origins)
        .allow_credentials(true)
}
