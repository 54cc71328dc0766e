//! Usergate Observability Module
//!
//! Provides configurable observability features including:
//! - Structured logging to the console and to daily-rotated JSON files
//! - Metrics collection via Prometheus, including gate rejections, limiter
//!   bucket counts and stored uploads
//! - HTTP request/response logging
//!
//! This module can be enabled or disabled at compile time via the `observability` feature flag.
//! At runtime, observability can be further controlled via the `OBSERVABILITY_ENABLED` environment variable.
//!
//! # Features
//!
//! - `observability` (default): Enables file logging, request logging and metrics
//!
//! With the feature disabled the same names are exported as no-ops and
//! logging falls back to [`basic_logging::init_basic_console_logging`].
//!
//! # Examples
//!
//! ```no_run
//! use usergate_observability::{init_metrics, init_tracing};
//!
//! #[tokio::main]
//! async fn main() {
//!     init_tracing();
//!     let metrics = init_metrics();
//!     // ... application code ...
//! }
//! ```

pub mod basic_logging;
#[cfg(feature = "observability")]
pub mod logging;
#[cfg(feature = "observability")]
pub mod metrics;

#[cfg(feature = "observability")]
pub use logging::{init_tracing, logging_middleware};
#[cfg(feature = "observability")]
pub use metrics::{
    MetricsHandle, init_metrics, is_observability_enabled, metrics_app, metrics_middleware,
    set_rate_limiter_buckets, track_gate_rejection, track_rate_limiter_evictions,
    track_upload_stored,
};

// No-op stubs when observability is disabled
#[cfg(not(feature = "observability"))]
pub mod stubs {
    use axum::{Router, extract::Request, middleware::Next, response::Response};

    /// Placeholder for the Prometheus handle.
    pub type MetricsHandle = ();

    /// No-op observability check when feature disabled
    pub fn is_observability_enabled() -> bool {
        false
    }

    /// No-op logging middleware when feature disabled
    pub async fn logging_middleware(req: Request, next: Next) -> Response {
        next.run(req).await
    }

    /// No-op metrics middleware when feature disabled
    pub async fn metrics_middleware(req: Request, next: Next) -> Response {
        next.run(req).await
    }

    /// Console logging only when feature disabled
    pub fn init_tracing() {
        crate::basic_logging::init_basic_console_logging();
    }

    /// No-op metrics initialization when feature disabled
    pub fn init_metrics() -> Option<MetricsHandle> {
        None
    }

    pub fn metrics_app(_handle: MetricsHandle) -> Router {
        Router::new()
    }

    // No-op tracking functions
    pub fn track_gate_rejection(_stage: &str, _tag: &str) {}
    pub fn set_rate_limiter_buckets(_class: &str, _count: usize) {}
    pub fn track_rate_limiter_evictions(_class: &str, _evicted: usize) {}
    pub fn track_upload_stored(_files: usize, _bytes: u64) {}
}

#[cfg(not(feature = "observability"))]
pub use stubs::*;
