//! Rate limiting configuration.
//!
//! Routes declare a [`RateClass`]; each class maps to a token-bucket policy
//! (refill rate per second and burst capacity). The three named classes are
//! fixed:
//!
//! | Class    | Requests/s | Burst |
//! |----------|-----------:|------:|
//! | Strict   |          1 |     2 |
//! | Moderate |         10 |    20 |
//! | Lenient  |        100 |   200 |
//!
//! [`RateClass::Custom`] covers anything else.
//!
//! # Configuration
//!
//! - `RATE_LIMIT_SWEEP_INTERVAL_SECS`: how often idle buckets are evicted (default: 300)
//! - `RATE_LIMIT_TRUST_FORWARDED`: key clients by `X-Forwarded-For` / `X-Real-IP`
//!   when present (default: false). Only enable behind a reverse proxy that
//!   overwrites these headers; otherwise a client can pick a fresh key per
//!   request.
//!
//! # Example
//!
//! ```ignore
//! use usergate_config::{RateClass, RateLimitConfig};
//!
//! let config = RateLimitConfig::from_env();
//! let policy = RateClass::Moderate.policy();
//! assert_eq!(policy.burst, 20);
//! ```

use std::fmt;
use std::time::Duration;

use usergate_core::rate_limiter::BucketPolicy;

use crate::env_parse;

/// Named request-rate class attached to a route.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RateClass {
    Strict,
    Moderate,
    Lenient,
    Custom { per_second: f64, burst: u32 },
}

impl RateClass {
    #[must_use]
    pub fn per_second(&self) -> f64 {
        match self {
            Self::Strict => 1.0,
            Self::Moderate => 10.0,
            Self::Lenient => 100.0,
            Self::Custom { per_second, .. } => *per_second,
        }
    }

    #[must_use]
    pub fn burst(&self) -> u32 {
        match self {
            Self::Strict => 2,
            Self::Moderate => 20,
            Self::Lenient => 200,
            Self::Custom { burst, .. } => *burst,
        }
    }

    #[must_use]
    pub fn policy(&self) -> BucketPolicy {
        BucketPolicy::new(self.per_second(), self.burst())
    }

    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Moderate => "moderate",
            Self::Lenient => "lenient",
            Self::Custom { .. } => "custom",
        }
    }

    /// A custom class must refill and admit at least one request.
    pub fn is_valid(&self) -> bool {
        let per_second = self.per_second();
        per_second.is_finite() && per_second > 0.0 && self.burst() >= 1
    }
}

impl fmt::Display for RateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom { per_second, burst } => write!(f, "custom({per_second}/s, burst {burst})"),
            named => f.write_str(named.name()),
        }
    }
}

/// Settings shared by every rate class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Interval between idle-bucket sweeps.
    pub sweep_interval: Duration,

    /// Prefer proxy headers over the socket address when keying clients.
    /// Requires a proxy that sets the headers itself.
    pub trust_forwarded_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(300),
            trust_forwarded_headers: false,
        }
    }
}

impl RateLimitConfig {
    /// Load from environment variables, falling back to defaults for unset
    /// or unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_interval: env_parse::<u64>("RATE_LIMIT_SWEEP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            trust_forwarded_headers: env_parse("RATE_LIMIT_TRUST_FORWARDED")
                .unwrap_or(defaults.trust_forwarded_headers),
        }
    }
}
