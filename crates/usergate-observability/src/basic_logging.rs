use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directive: `LOG_LEVEL` (default "info") for the usergate
/// crates, warn for noisy dependencies.
pub fn default_filter() -> EnvFilter {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "usergate={level},usergate_core={level},usergate_auth={level},usergate_observability={level},tower_http=warn,hyper=warn",
            level = log_level
        ))
    })
}

/// Initialize basic console logging when observability is disabled.
///
/// This provides a minimal but functional logging setup that enables console output
/// for all tracing macros (info!, warn!, error!, debug!, etc.) throughout the application.
///
/// # Configuration
///
/// - **Log Level**: `RUST_LOG` if set, otherwise `LOG_LEVEL` (default: "info")
/// - **Filtering**: Noisy dependencies filtered to warn level for cleaner output
/// - **Format**: Compact format with ANSI colors
pub fn init_basic_console_logging() {
    let console_layer = fmt::layer()
        .compact()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .with_filter(default_filter());

    if tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_err()
    {
        return;
    }

    // Print initialization message to stderr (bypasses logging system)
    eprintln!(
        "Observability disabled - console logging only (OBSERVABILITY_ENABLED=false or feature not compiled)"
    );
}
