//! Token bucket rate limiter for market data providers.
//!
//! Each provider gets its own bucket, sized from the [`RateLimit`] the
//! adapter declares. The limiter never waits: an empty bucket means the
//! call is rejected locally and surfaces as `RateLimited`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::provider::RateLimit;

/// Token bucket for a single provider.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    /// Tokens per second.
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    fn from_limit(limit: &RateLimit) -> Self {
        let capacity = f64::from(limit.burst.max(1));
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: f64::from(limit.requests_per_minute.max(1)) / 60.0,
            capacity,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Per-provider token buckets behind one lock.
///
/// Providers that were never registered get a bucket built from
/// [`RateLimit::default`] on first use.
#[derive(Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    limits: Mutex<HashMap<String, RateLimit>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means a panic mid-refill; the counts are still usable.
    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_limits(&self) -> MutexGuard<'_, HashMap<String, RateLimit>> {
        self.limits.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter limits mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Set the limit for a provider and start it with a full bucket.
    pub fn configure(&self, provider: &str, limit: RateLimit) {
        debug!(
            "Rate limiter: '{}' allows {}/min (burst {})",
            provider, limit.requests_per_minute, limit.burst
        );
        let bucket = TokenBucket::from_limit(&limit);
        self.lock_limits().insert(provider.to_string(), limit);
        self.lock_buckets().insert(provider.to_string(), bucket);
    }

    /// Take a token if one is available.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let mut buckets = self.lock_buckets();
        let bucket = buckets
            .entry(provider.to_string())
            .or_insert_with(|| self.create_bucket(provider));

        let acquired = bucket.try_acquire();
        if !acquired {
            debug!("Rate limiter: '{}' has no tokens left", provider);
        }
        acquired
    }

    /// How long until the next token for `provider`.
    pub fn time_until_available(&self, provider: &str) -> Duration {
        let mut buckets = self.lock_buckets();
        match buckets.get_mut(provider) {
            Some(bucket) => bucket.time_until_available(),
            None => Duration::ZERO,
        }
    }

    /// Tokens left for `provider` after refilling for elapsed time.
    pub fn remaining_tokens(&self, provider: &str) -> f64 {
        let mut buckets = self.lock_buckets();
        match buckets.get_mut(provider) {
            Some(bucket) => {
                bucket.refill();
                bucket.tokens
            }
            None => self.create_bucket(provider).capacity,
        }
    }

    fn create_bucket(&self, provider: &str) -> TokenBucket {
        match self.lock_limits().get(provider) {
            Some(limit) => TokenBucket::from_limit(limit),
            None => TokenBucket::from_limit(&RateLimit::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(per_minute: u32, burst: u32) -> RateLimit {
        RateLimit {
            requests_per_minute: per_minute,
            requests_per_day: None,
            burst,
        }
    }

    #[test]
    fn test_bucket_drains_to_burst() {
        let mut bucket = TokenBucket::from_limit(&limit(60, 3));
        for _ in 0..3 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn test_bucket_refills_over_time() {
        let mut bucket = TokenBucket::from_limit(&limit(60, 1));
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());

        bucket.last_update = Instant::now() - Duration::from_secs(2);
        assert!(bucket.try_acquire());
    }

    #[test]
    fn test_unregistered_provider_uses_default_limit() {
        let limiter = RateLimiter::new();
        let burst = RateLimit::default().burst as usize;
        for _ in 0..burst {
            assert!(limiter.try_acquire("finnhub"));
        }
        assert!(!limiter.try_acquire("finnhub"));
    }

    #[test]
    fn test_configured_limit_and_isolation() {
        let limiter = RateLimiter::new();
        limiter.configure("alphavantage", limit(5, 2));

        assert!(limiter.try_acquire("alphavantage"));
        assert!(limiter.try_acquire("alphavantage"));
        assert!(!limiter.try_acquire("alphavantage"));
        assert!(limiter.time_until_available("alphavantage") > Duration::ZERO);

        assert!(limiter.try_acquire("finnhub"));
    }

    #[test]
    fn test_remaining_tokens() {
        let limiter = RateLimiter::new();
        limiter.configure("finnhub", limit(60, 10));
        limiter.try_acquire("finnhub");
        limiter.try_acquire("finnhub");

        let remaining = limiter.remaining_tokens("finnhub");
        assert!((remaining - 8.0).abs() < 0.01);
    }
}
