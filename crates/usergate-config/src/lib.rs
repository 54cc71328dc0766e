//! # Usergate Config
//!
//! Configuration types for the usergate API.
//!
//! Every structure is loaded from environment variables with `from_env()` and
//! falls back to its `Default` value for anything unset or unparseable:
//!
//! - [`jwt`]: token signing secret and lifetime
//! - [`rate_limit`]: rate classes and the limiter sweep
//! - [`upload`]: upload root directory and I/O timeout
//! - [`cors`]: allowed origins
//! - [`server`]: bind address and request timeout
//!
//! # Example
//!
//! ```ignore
//! use usergate_config::{JwtConfig, RateLimitConfig, ServerConfig};
//!
//! let jwt_config = JwtConfig::from_env();
//! let rate_limit_config = RateLimitConfig::from_env();
//! let server_config = ServerConfig::from_env();
//! ```

pub mod cors;
pub mod jwt;
pub mod rate_limit;
pub mod server;
pub mod upload;

// Re-export commonly used types at crate root
pub use cors::CorsConfig;
pub use jwt::JwtConfig;
pub use rate_limit::{RateClass, RateLimitConfig};
pub use server::ServerConfig;
pub use upload::UploadConfig;

/// Parse an environment variable, `None` when unset, empty or invalid.
pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| v.trim().parse().ok())
}
