//! Token-bucket rate limiting for outbound requests
//!
//! Each backend connector owns one bucket. Tokens refill continuously at a
//! fixed rate up to a fixed capacity; callers suspend until their debit
//! fits. Refill is computed lazily on each acquisition, never by a timer.

use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::trace;

use crate::error::{ConfigError, PulsepostError, Result};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket throttle bounding outbound request rate
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    rate: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Create a bucket holding at most `capacity` tokens, refilled at
    /// `rate` tokens per second. The bucket starts full.
    ///
    /// # Errors
    ///
    /// Returns a config error when `rate` is zero, negative, or not finite;
    /// such a bucket could never refill and every blocked acquire would
    /// wait forever.
    pub fn new(capacity: u32, rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PulsepostError::Config(ConfigError::InvalidValue(format!(
                "rate_per_sec must be a positive number, got {}",
                rate
            ))));
        }

        let capacity = capacity.max(1) as f64;
        Ok(Self {
            capacity,
            rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Suspend until `tokens` units are available, then debit them.
    ///
    /// # Errors
    ///
    /// Returns [`PulsepostError::CapacityExceeded`] when the request exceeds
    /// bucket capacity; such a request could never succeed.
    pub async fn acquire(&self, tokens: u32) -> Result<()> {
        if tokens as f64 > self.capacity {
            return Err(PulsepostError::CapacityExceeded {
                requested: tokens,
                capacity: self.capacity as u32,
            });
        }

        let needed = tokens as f64;

        // Explicit loop rather than recursion: after the sleep the whole
        // acquisition is re-evaluated, which accounts for concurrent debits
        // that happened while we waited.
        loop {
            let wait = {
                let mut state = self.state.lock().await;

                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
                state.last_refill = Instant::now();

                if state.tokens >= needed {
                    state.tokens -= needed;
                    return Ok(());
                }

                let deficit = needed - state.tokens;
                Duration::from_secs_f64(deficit / self.rate)
            };

            // Lock is released before suspending
            trace!(wait_ms = wait.as_millis() as u64, "rate limiter waiting for tokens");
            sleep(wait).await;
        }
    }

    /// Current token count, for tests and diagnostics
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last_refill = Instant::now();
        state.tokens
    }
}
