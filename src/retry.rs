//! Reusable retry policy with rate-limit-aware backoff

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::{EngineError, Result};

/// Bounded exponential backoff applied around a single fallible operation.
///
/// Two curves exist: rate-limited failures wait `base_delay^attempt` plus
/// up to one second of jitter, everything else waits `2^attempt` seconds.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_secs: u32,
    /// Select the slower curve when the failure signals rate limiting
    pub rate_limit_aware: bool,
    pub jitter: bool,
}

impl RetryPolicy {
    /// Provider-call policy: 5 attempts, rate-limit-aware, jittered
    pub fn provider() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 3,
            rate_limit_aware: true,
            jitter: true,
        }
    }

    /// Page-routine policy: 3 attempts, plain exponential, no jitter
    pub fn page() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2,
            rate_limit_aware: false,
            jitter: false,
        }
    }

    /// Override the attempt budget
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    fn delay_for(&self, error: &EngineError, attempt: u32) -> Duration {
        if self.rate_limit_aware && error.is_rate_limited() {
            let mut secs = (self.base_delay_secs as f64).powi(attempt as i32);
            if self.jitter {
                secs += rand::thread_rng().gen_range(0.0..1.0);
            }
            Duration::from_secs_f64(secs)
        } else {
            Duration::from_secs(2u64.pow(attempt))
        }
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted.
    /// Exhaustion yields a synthesized error summarizing likely causes
    /// rather than the raw final failure.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for attempt in 0..self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt + 1 < self.max_attempts {
                        let delay = self.delay_for(&e, attempt);
                        warn!(
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts,
                            delay_secs = delay.as_secs_f64(),
                            rate_limited = e.is_rate_limited(),
                            "Attempt failed, retrying: {}",
                            truncate(&e.to_string(), 200)
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    error!(
                        attempts = self.max_attempts,
                        "Operation failed, retry budget exhausted: {}",
                        truncate(&e.to_string(), 200)
                    );
                }
            }
        }

        Err(EngineError::provider(
            None,
            format!(
                "Image generation failed after {} attempts.\n\
                 Possible causes: API rate limit or quota exceeded, unstable \
                 network connection, or the API service is temporarily \
                 unavailable. Try again later, or check API quota and \
                 network status.",
                self.max_attempts
            ),
        ))
    }
}

fn truncate(message: &str, max: usize) -> String {
    message.chars().take(max).collect()
}
