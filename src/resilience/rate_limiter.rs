//! Token bucket rate limiter bounding outbound probe rate per pool.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Returned when a wait is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limiter wait cancelled")]
pub struct RateLimitError;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    /// Take one token, or report how long until one is available.
    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(missing / refill_rate))
        }
    }
}

/// Rate limiter shared by all workers of a pool.
///
/// One token is added every `interval`, up to `burst` tokens.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    interval: Duration,
    burst: f64,
    refill_rate: f64,
}

impl RateLimiter {
    /// `interval` must be non-zero; a zero `burst` is raised to one.
    pub fn new(interval: Duration, burst: u32) -> Self {
        let interval = interval.max(Duration::from_micros(1));
        let burst = f64::from(burst.max(1));
        Self {
            bucket: Mutex::new(TokenBucket::new(burst)),
            interval,
            burst,
            refill_rate: 1.0 / interval.as_secs_f64(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn burst(&self) -> u32 {
        self.burst as u32
    }

    /// Take a token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.poll().is_ok()
    }

    /// Wait for a token, or until `cancel` fires.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        loop {
            if cancel.is_cancelled() {
                return Err(RateLimitError);
            }

            let delay = match self.poll() {
                Ok(()) => return Ok(()),
                Err(delay) => delay,
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(RateLimitError),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn poll(&self) -> Result<(), Duration> {
        let mut bucket = match self.bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        bucket.try_acquire(self.burst, self.refill_rate)
    }
}
