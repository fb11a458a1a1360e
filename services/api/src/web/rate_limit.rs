//! services/api/src/web/rate_limit.rs
//!
//! Per-client token buckets. Each client starts with a full bucket of
//! `max_requests` tokens that refills continuously over the configured window.
//! A bucket left idle for a whole window is full again, so it is dropped and
//! recreated on the client's next request.

use crate::config::RateLimitConfig;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

struct Buckets {
    entries: HashMap<String, Bucket>,
    last_sweep: Instant,
}

pub struct RateLimiter {
    buckets: Mutex<Buckets>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(Buckets {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            config,
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_secs.max(1))
    }

    /// Takes one token for `key`; `false` means the client is over its limit.
    pub async fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now()).await
    }

    async fn allow_at(&self, key: &str, now: Instant) -> bool {
        let capacity = self.config.capacity();
        let window = self.window();
        let mut lock = self.buckets.lock().await;
        if now.saturating_duration_since(lock.last_sweep) >= window {
            lock.entries
                .retain(|_, b| now.saturating_duration_since(b.last_refill) < window);
            lock.last_sweep = now;
        }
        let bucket = lock.entries.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: capacity,
            last_refill: now,
        });
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * self.config.refill_per_sec()).min(capacity);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Seconds until `key` has a whole token again, for `Retry-After`.
    pub async fn retry_after_secs(&self, key: &str) -> u64 {
        let lock = self.buckets.lock().await;
        let missing = lock.entries.get(key).map_or(0.0, |b| (1.0 - b.tokens).max(0.0));
        (missing / self.config.refill_per_sec()).ceil() as u64
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.buckets.lock().await.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            window_secs,
            max_requests,
        })
    }

    #[tokio::test]
    async fn burst_is_capped_at_capacity() {
        let limiter = limiter(3, 60);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.allow_at("10.0.0.1", now).await);
        }
        assert!(!limiter.allow_at("10.0.0.1", now).await);
        // Other clients have their own bucket.
        assert!(limiter.allow_at("10.0.0.2", now).await);
    }

    #[tokio::test]
    async fn tokens_refill_over_the_window() {
        let limiter = limiter(2, 10); // one token every 5s
        let start = Instant::now();
        assert!(limiter.allow_at("k", start).await);
        assert!(limiter.allow_at("k", start).await);
        assert!(!limiter.allow_at("k", start).await);
        assert!(limiter.retry_after_secs("k").await >= 1);

        assert!(!limiter.allow_at("k", start + Duration::from_secs(2)).await);
        assert!(limiter.allow_at("k", start + Duration::from_secs(6)).await);
    }

    #[tokio::test]
    async fn idle_buckets_are_swept_after_a_window() {
        let limiter = limiter(2, 10);
        let start = Instant::now();
        for i in 0..50 {
            assert!(limiter.allow_at(&format!("10.0.0.{}", i), start).await);
        }
        assert_eq!(limiter.tracked().await, 50);

        // A key seen recently survives; the idle ones go.
        let later = start + Duration::from_secs(11);
        assert!(limiter.allow_at("10.0.0.7", start + Duration::from_secs(5)).await);
        assert!(limiter.allow_at("192.168.1.1", later).await);
        assert_eq!(limiter.tracked().await, 2);
    }
}
