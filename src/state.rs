use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use usergate_auth::TokenCodec;
use usergate_config::{CorsConfig, JwtConfig, RateClass, RateLimitConfig, ServerConfig, UploadConfig};
use usergate_core::{RateLimiterRegistry, SweepReport, SweeperHandle};
use usergate_observability::{set_rate_limiter_buckets, track_rate_limiter_evictions};

#[derive(Clone, Debug)]
pub struct AppState {
    pub codec: Arc<TokenCodec>,
    pub limiters: Arc<RateLimiters>,
    pub rate_limit_config: RateLimitConfig,
    pub upload_config: UploadConfig,
    pub cors_config: CorsConfig,
    pub server_config: ServerConfig,
}

impl AppState {
    /// Must be called inside a Tokio runtime: it starts the limiter sweepers.
    pub fn new(
        jwt_config: &JwtConfig,
        rate_limit_config: RateLimitConfig,
        upload_config: UploadConfig,
        cors_config: CorsConfig,
        server_config: ServerConfig,
    ) -> Self {
        Self {
            codec: Arc::new(TokenCodec::from_config(jwt_config)),
            limiters: Arc::new(RateLimiters::new(&rate_limit_config)),
            rate_limit_config,
            upload_config,
            cors_config,
            server_config,
        }
    }
}

/// Limiter registries, one per rate class.
///
/// Named classes share one registry across all routes using them, so a
/// client's budget for `moderate` is spent on any moderate route. Each custom
/// class gets a registry of its own.
#[derive(Debug)]
pub struct RateLimiters {
    strict: Arc<RateLimiterRegistry>,
    moderate: Arc<RateLimiterRegistry>,
    lenient: Arc<RateLimiterRegistry>,
    sweep_interval: std::time::Duration,
    sweepers: Mutex<Vec<SweeperHandle>>,
}

impl RateLimiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        let limiters = Self {
            strict: Arc::new(Self::registry_for(RateClass::Strict)),
            moderate: Arc::new(Self::registry_for(RateClass::Moderate)),
            lenient: Arc::new(Self::registry_for(RateClass::Lenient)),
            sweep_interval: config.sweep_interval,
            sweepers: Mutex::new(Vec::new()),
        };

        for registry in [&limiters.strict, &limiters.moderate, &limiters.lenient] {
            limiters.start_sweeper(registry);
        }
        limiters
    }

    fn registry_for(class: RateClass) -> RateLimiterRegistry {
        RateLimiterRegistry::new(class.name(), class.policy())
    }

    fn start_sweeper(&self, registry: &Arc<RateLimiterRegistry>) {
        let handle =
            RateLimiterRegistry::spawn_sweeper(registry, self.sweep_interval, report_sweep);
        self.sweepers.lock().push(handle);
    }

    /// Registry enforcing `class`.
    pub fn registry(&self, class: RateClass) -> Arc<RateLimiterRegistry> {
        match class {
            RateClass::Strict => Arc::clone(&self.strict),
            RateClass::Moderate => Arc::clone(&self.moderate),
            RateClass::Lenient => Arc::clone(&self.lenient),
            RateClass::Custom { .. } => {
                let registry = Arc::new(Self::registry_for(class));
                self.start_sweeper(&registry);
                registry
            }
        }
    }

    /// Stop every sweeper and wait for them to exit.
    pub async fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.sweepers.lock());
        let count = handles.len();
        for handle in handles {
            handle.shutdown().await;
        }
        info!(sweepers = count, "Rate limiter sweepers stopped");
    }
}

fn report_sweep(report: SweepReport) {
    set_rate_limiter_buckets(report.class, report.remaining);
    track_rate_limiter_evictions(report.class, report.evicted);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_named_classes_share_a_registry() {
        let limiters = RateLimiters::new(&RateLimitConfig::default());

        let a = limiters.registry(RateClass::Moderate);
        let b = limiters.registry(RateClass::Moderate);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &limiters.registry(RateClass::Strict)));
        assert_eq!(a.policy().burst, 20);

        limiters.shutdown().await;
    }

    #[tokio::test]
    async fn test_custom_classes_are_isolated() {
        let limiters = RateLimiters::new(&RateLimitConfig::default());
        let class = RateClass::Custom {
            per_second: 0.5,
            burst: 1,
        };

        let a = limiters.registry(class);
        let b = limiters.registry(class);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.class(), "custom");
        assert_eq!(limiters.sweepers.lock().len(), 5);

        assert!(a.allow("198.51.100.1"));
        assert!(!a.allow("198.51.100.1"));
        assert!(b.allow("198.51.100.1"));

        limiters.shutdown().await;
        assert!(limiters.sweepers.lock().is_empty());
    }
}
