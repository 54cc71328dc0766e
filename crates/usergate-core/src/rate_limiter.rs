//! Per-client token-bucket rate limiting.
//!
//! A [`RateLimiterRegistry`] owns one [`RateBucket`] per client key (usually
//! the client IP). Buckets refill continuously at `per_second` tokens per
//! second up to `burst`, and every admitted request consumes one token.
//!
//! # Locking
//!
//! Buckets live in a sharded [`DashMap`], each behind its own mutex:
//!
//! - the hot path takes a shard *read* guard plus the bucket mutex, so
//!   requests for unrelated keys never serialize on each other;
//! - creating a bucket takes the shard *write* guard once per new key;
//! - the eviction sweep takes shard write guards, so it can never observe a
//!   bucket while an `allow` call on the same key is mid-update.
//!
//! No guard is ever held across an `.await`.
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(RateLimiterRegistry::new("moderate", BucketPolicy::new(10.0, 20)));
//! let sweeper = RateLimiterRegistry::spawn_sweeper(&registry, Duration::from_secs(300), |_| {});
//!
//! if !registry.allow("203.0.113.7") {
//!     // reject with 429
//! }
//!
//! sweeper.shutdown().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Refill rate and burst size shared by every bucket of a registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketPolicy {
    pub per_second: f64,
    pub burst: u32,
}

impl BucketPolicy {
    pub const fn new(per_second: f64, burst: u32) -> Self {
        Self { per_second, burst }
    }
}

/// Mutable refill state for a single client key.
#[derive(Debug)]
pub struct RateBucket {
    tokens: f64,
    last_refill: Instant,
    capacity: f64,
    rate: f64,
}

impl RateBucket {
    fn full(policy: BucketPolicy, now: Instant) -> Self {
        let capacity = f64::from(policy.burst);
        Self {
            tokens: capacity,
            last_refill: now,
            capacity,
            rate: policy.per_second,
        }
    }

    fn refill(&mut self, now: Instant) {
        // A caller that sampled `now` before another caller updated the bucket
        // must not move `last_refill` backwards.
        if now <= self.last_refill {
            return;
        }
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn is_full(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.tokens >= self.capacity
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

/// Outcome of one eviction pass, handed to the sweeper's report hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub class: &'static str,
    pub evicted: usize,
    pub remaining: usize,
}

/// Keyed collection of token buckets sharing one [`BucketPolicy`].
#[derive(Debug)]
pub struct RateLimiterRegistry {
    class: &'static str,
    policy: BucketPolicy,
    buckets: DashMap<String, Mutex<RateBucket>>,
}

impl RateLimiterRegistry {
    pub fn new(class: &'static str, policy: BucketPolicy) -> Self {
        Self {
            class,
            policy,
            buckets: DashMap::new(),
        }
    }

    pub fn class(&self) -> &'static str {
        self.class
    }

    pub fn policy(&self) -> BucketPolicy {
        self.policy
    }

    /// Admit or reject one request for `key`.
    ///
    /// The first request from an unseen key finds a full bucket.
    pub fn allow(&self, key: &str) -> bool {
        if let Some(bucket) = self.buckets.get(key) {
            return bucket.lock().try_take(Instant::now());
        }

        let bucket = self
            .buckets
            .entry(key.to_owned())
            .or_insert_with(|| Mutex::new(RateBucket::full(self.policy, Instant::now())));
        bucket.lock().try_take(Instant::now())
    }

    /// Current token count for `key`, if a bucket exists.
    pub fn tokens(&self, key: &str) -> Option<f64> {
        self.buckets.get(key).map(|bucket| {
            let mut bucket = bucket.lock();
            bucket.refill(Instant::now());
            bucket.tokens()
        })
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Remove every bucket that has refilled to full capacity.
    ///
    /// Returns the number of evicted buckets.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut evicted = 0;
        self.buckets.retain(|_, bucket| {
            let idle = bucket.get_mut().is_full(now);
            if idle {
                evicted += 1;
            }
            !idle
        });
        evicted
    }

    /// Run [`sweep`](Self::sweep) every `every` on a background task.
    ///
    /// The task only holds a weak reference: it stops on its own once the
    /// registry is dropped, and immediately when the returned handle is shut
    /// down or dropped.
    pub fn spawn_sweeper<F>(registry: &Arc<Self>, every: Duration, on_sweep: F) -> SweeperHandle
    where
        F: Fn(SweepReport) + Send + 'static,
    {
        let weak = Arc::downgrade(registry);
        let class = registry.class;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(registry) = weak.upgrade() else {
                            debug!(class, "Rate limiter dropped, sweeper exiting");
                            break;
                        };
                        let evicted = registry.sweep();
                        let report = SweepReport {
                            class,
                            evicted,
                            remaining: registry.len(),
                        };
                        if evicted > 0 {
                            debug!(class, evicted, remaining = report.remaining, "Evicted idle rate limit buckets");
                        }
                        on_sweep(report);
                    }
                    _ = &mut shutdown_rx => {
                        debug!(class, "Rate limiter sweeper shutting down");
                        break;
                    }
                }
            }
        });

        SweeperHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Owner of a running sweeper task. Dropping it stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signal the sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
