use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::CollectorConfig;
use crate::model::SourceId;

/// Bounded, fixed-delay retry for flaky providers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_delay())
    }

    /// Attempts never drop below one.
    pub fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Runs `operation` until it succeeds or the attempts are used up,
    /// returning the last error.
    pub async fn run<T, E, F, Fut>(&self, source: SourceId, what: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts() => {
                    tracing::warn!(
                        source = %source,
                        attempt,
                        error = %e,
                        "Failed to {}, retrying in {:?}",
                        what,
                        self.delay
                    );
                    self.pause().await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
