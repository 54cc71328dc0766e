//! Rate-limit stage: client keying and bucket checks.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use thiserror::Error;
use tracing::warn;

use usergate_core::{AppError, RateLimiterRegistry};

/// Key used for clients whose address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateFailure {
    #[error("Rate limit exceeded. Please try again later.")]
    LimitExceeded,
}

impl From<RateFailure> for AppError {
    fn from(failure: RateFailure) -> Self {
        AppError::too_many_requests(failure.to_string())
    }
}

/// Identify the client for rate limiting.
///
/// With `trust_forwarded` set, the first `X-Forwarded-For` entry wins, then
/// `X-Real-IP`. Otherwise, or when neither header is usable, the socket peer
/// address is used.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        if let Some(ip) = forwarded.or_else(real_ip) {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub fn check_rate(limiter: &RateLimiterRegistry, client: &str) -> Result<(), RateFailure> {
    if limiter.allow(client) {
        Ok(())
    } else {
        warn!(client, class = limiter.class(), "Rate limit exceeded");
        Err(RateFailure::LimitExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use usergate_core::BucketPolicy;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.10:54321".parse().unwrap())
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_key(&map, peer(), true), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let map = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_key(&map, peer(), true), "198.51.100.2");

        let map = headers(&[("x-forwarded-for", " "), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_key(&map, peer(), true), "198.51.100.2");
    }

    #[test]
    fn test_peer_address_when_untrusted() {
        let map = headers(&[("x-forwarded-for", "203.0.113.7")]);
        assert_eq!(client_key(&map, peer(), false), "192.0.2.10");
        assert_eq!(client_key(&HeaderMap::new(), None, true), UNKNOWN_CLIENT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_rate_rejects_after_burst() {
        let limiter = RateLimiterRegistry::new("strict", BucketPolicy::new(1.0, 2));
        assert!(check_rate(&limiter, "a").is_ok());
        assert!(check_rate(&limiter, "a").is_ok());
        assert_eq!(check_rate(&limiter, "a"), Err(RateFailure::LimitExceeded));

        let err: AppError = RateFailure::LimitExceeded.into();
        assert_eq!(err.tag, "LimitExceeded");
    }
}
