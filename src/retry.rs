//! Retry with exponential backoff around fallible backend operations
//!
//! This is the local-recovery boundary: individual attempt failures are
//! logged here and never observed by callers, who only ever see success or
//! the terminal [`PulsepostError::OperationFailed`].

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{PlatformError, PulsepostError, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay())
    }

    /// Run `op` up to `max_attempts` times, sleeping
    /// `base_delay * 2^attempt_index` after each failed non-final attempt.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, PlatformError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempt = attempt + 1, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(
                            operation,
                            attempts = attempt,
                            error = %error,
                            "giving up after final attempt"
                        );
                        return Err(PulsepostError::OperationFailed {
                            operation: operation.to_string(),
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    let delay = self.base_delay * 2u32.pow(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "attempt failed, retrying in {}",
                        humantime::format_duration(delay)
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
