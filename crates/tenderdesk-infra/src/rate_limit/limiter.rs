use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
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

    fn time_until_next_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let seconds = (1.0 - self.tokens) / self.refill_rate;
            Duration::from_secs_f64(seconds.max(0.0))
        }
    }
}

/// Token-bucket limiter keyed by provider name.
///
/// One instance is shared by every request handler and batch worker so the
/// per-provider call rate holds across the whole process.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    capacity: f64,
    refill_rate: f64,
}

impl RateLimiter {
    /// `refill_rate` tokens per second, bursting up to `capacity`.
    pub fn new(refill_rate: f64, capacity: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1.0),
            refill_rate: refill_rate.max(f64::MIN_POSITIVE),
        }
    }

    /// Allow `calls` per minute per key, with a burst of up to a minute's worth.
    pub fn per_minute(calls: u32) -> Self {
        Self::new(calls as f64 / 60.0, calls as f64)
    }

    /// Wait until a token for `key` is available, then take it.
    #[tracing::instrument(skip(self))]
    pub async fn acquire(&self, key: &str) {
        loop {
            let wait_duration = {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets
                    .entry(key.to_string())
                    .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_rate));

                if bucket.try_acquire() {
                    tracing::trace!(
                        key = %key,
                        tokens_remaining = bucket.tokens,
                        "Rate limit token acquired"
                    );
                    return;
                }

                bucket.time_until_next_token()
            };

            tracing::debug!(
                key = %key,
                wait_ms = wait_duration.as_millis() as u64,
                "Rate limit reached, waiting for token"
            );
            tokio::time::sleep(wait_duration.max(Duration::from_millis(1))).await;
        }
    }

    /// Take a token for `key` if one is available, without waiting.
    pub async fn try_acquire(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_rate))
            .try_acquire()
    }

    pub async fn available_tokens(&self, key: &str) -> f64 {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_rate));
        bucket.refill();
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keys_have_independent_buckets() {
        let limiter = RateLimiter::new(1.0, 2.0);

        assert!(limiter.try_acquire("anthropic").await);
        assert!(limiter.try_acquire("anthropic").await);
        assert!(!limiter.try_acquire("anthropic").await);

        assert!(limiter.try_acquire("openai").await);
    }

    #[tokio::test]
    async fn test_refill_over_time() {
        let limiter = RateLimiter::new(20.0, 2.0);
        while limiter.try_acquire("gemini").await {}

        let before = limiter.available_tokens("gemini").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let after = limiter.available_tokens("gemini").await;

        assert!(after > before);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_token() {
        let limiter = RateLimiter::new(50.0, 1.0);
        limiter.acquire("anthropic").await;

        let start = Instant::now();
        limiter.acquire("anthropic").await;
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let limiter = RateLimiter::per_minute(1);
        let clone = limiter.clone();
        assert!(limiter.try_acquire("openai").await);
        assert!(!clone.try_acquire("openai").await);
    }
}
