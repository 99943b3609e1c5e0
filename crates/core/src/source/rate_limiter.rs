//! Token bucket rate limiter shared by every request to the listing source.

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Rate limit status snapshot.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub requests_per_second: u32,
    pub tokens_available: f64,
    pub next_available_in_ms: Option<u64>,
}

/// Token bucket.
///
/// Tokens are added at a constant rate and consumed by requests. The bucket
/// holds at most one second worth of tokens, so bursts never exceed the
/// configured rate.
#[derive(Debug)]
pub struct TokenBucket {
    /// Max tokens (= requests per second).
    capacity: f64,
    /// Current available tokens.
    tokens: f64,
    /// Tokens added per second.
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// The bucket starts full. `requests_per_second` is clamped to at least 1.
    pub fn new(requests_per_second: u32) -> Self {
        let capacity = requests_per_second.max(1) as f64;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Try to take a token.
    ///
    /// Returns `Err(wait)` with the time until one token is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(tokens_needed / self.refill_rate))
        }
    }

    pub fn status(&mut self) -> RateLimitStatus {
        self.refill();
        RateLimitStatus {
            requests_per_second: self.capacity as u32,
            tokens_available: self.tokens,
            next_available_in_ms: if self.tokens >= 1.0 {
                None
            } else {
                let tokens_needed = 1.0 - self.tokens;
                Some((tokens_needed / self.refill_rate * 1000.0) as u64)
            },
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Async limiter wrapping a [`TokenBucket`].
///
/// `acquire` never rejects: callers wait until a token is free. One instance
/// is shared by all concurrent fetches of a run.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(requests_per_second)),
        }
    }

    /// Wait until a request may proceed.
    pub async fn acquire(&self) {
        loop {
            // The lock is released before sleeping so other callers can refill-check.
            let wait = match self.bucket.lock().await.try_acquire() {
                Ok(()) => return,
                Err(wait) => wait,
            };
            sleep(wait).await;
        }
    }

    pub async fn status(&self) -> RateLimitStatus {
        self.bucket.lock().await.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_token_bucket_new() {
        let bucket = TokenBucket::new(10);
        assert_eq!(bucket.capacity, 10.0);
        assert_eq!(bucket.tokens, 10.0);
        assert_eq!(bucket.refill_rate, 10.0);
    }

    #[test]
    fn test_token_bucket_zero_rate_clamped() {
        let bucket = TokenBucket::new(0);
        assert_eq!(bucket.capacity, 1.0);
    }

    #[test]
    fn test_token_bucket_acquire_success() {
        let mut bucket = TokenBucket::new(10);

        for _ in 0..10 {
            assert!(bucket.try_acquire().is_ok());
        }

        // 11th should fail
        assert!(bucket.try_acquire().is_err());
    }

    #[test]
    fn test_token_bucket_acquire_returns_wait_time() {
        let mut bucket = TokenBucket::new(10);

        for _ in 0..10 {
            bucket.try_acquire().unwrap();
        }

        let err = bucket.try_acquire().unwrap_err();
        // At 10 rps, 1 token takes 100ms to refill
        assert!(err.as_millis() <= 100);
        assert!(err.as_nanos() > 0);
    }

    #[test]
    fn test_token_bucket_status() {
        let mut bucket = TokenBucket::new(3);

        let status = bucket.status();
        assert_eq!(status.requests_per_second, 3);
        assert!(status.next_available_in_ms.is_none());

        for _ in 0..3 {
            bucket.try_acquire().unwrap();
        }

        let status = bucket.status();
        assert!(status.tokens_available < 1.0);
        assert!(status.next_available_in_ms.is_some());
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let mut bucket = TokenBucket::new(10);

        for _ in 0..10 {
            bucket.try_acquire().unwrap();
        }
        assert!(bucket.tokens < 1.0);

        sleep(Duration::from_millis(150)).await;
        bucket.refill();

        // ~1.5 tokens back
        assert!(bucket.tokens >= 1.0);
        assert!(bucket.tokens < 3.0);
    }

    #[tokio::test]
    async fn test_acquire_waits_when_exhausted() {
        let limiter = RateLimiter::new(20);

        let start = Instant::now();
        for _ in 0..20 {
            limiter.acquire().await;
        }
        // Burst capacity is spent without waiting
        assert!(start.elapsed() < Duration::from_millis(40));

        limiter.acquire().await;
        limiter.acquire().await;
        // Two more tokens at 20 rps need roughly 100ms
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_acquire_shared_across_tasks() {
        let limiter = Arc::new(RateLimiter::new(10));
        let start = Instant::now();

        let tasks: Vec<_> = (0..15)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // 10 immediately, 5 more at 10 rps
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}
