//! Fixed-delay retry policy shared by all marketplace and rate queries.
//!
//! Every upstream error class exhausts the same budget: a connection refusal,
//! a timeout, and an HTTP 4xx all consume one attempt. The retry loop makes
//! no backoff distinction between them.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt budget and inter-attempt delay for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Runs `op` until it succeeds or the attempt budget is exhausted,
    /// sleeping the fixed delay between attempts. Returns the final error on
    /// exhaustion; callers demote it to their own sentinel.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < attempts => {
                    tracing::warn!(attempt, attempts, "{label} attempt failed: {error}");
                    tokio::time::sleep(self.delay).await;
                }
                Err(error) => {
                    tracing::error!("all {label} attempts failed, final error: {error}");
                    return Err(error);
                }
            }
        }
    }
}
