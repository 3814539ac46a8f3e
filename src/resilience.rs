// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resilience utilities: retry policy for direct mode sends.
//!
//! - [`RetryConfig`]: attempt budget and inter-attempt delay
//! - [`retry`]: run an async operation under a [`RetryConfig`]
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), String> {
//! use movilizer_outbox::resilience::{retry, RetryConfig};
//!
//! let config = RetryConfig::direct();
//! let value = retry(&config, "ping", |_attempt| async { Ok::<_, String>(42) }).await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Configuration for send retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: usize,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (ceiling for backoff).
    pub max_delay: Duration,

    /// Backoff multiplier. `1.0` keeps the delay fixed.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::direct()
    }
}

impl RetryConfig {
    /// Fixed-delay policy.
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_factor: 1.0,
        }
    }

    /// Direct mode policy: 3 attempts, 10 seconds apart.
    ///
    /// # Schedule
    ///
    /// ```text
    /// Attempt  Wait before
    /// -------  -----------
    /// 1        0s
    /// 2        10s
    /// 3        10s
    /// ```
    pub fn direct() -> Self {
        Self::fixed(3, Duration::from_secs(10))
    }

    /// Fast-fail retry for tests.
    pub fn testing() -> Self {
        Self::fixed(3, Duration::from_millis(10))
    }

    /// Calculate delay for a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let multiplier = self.backoff_factor.powi((attempt - 1) as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let delay = Duration::from_secs_f64(delay_secs);

        std::cmp::min(delay, self.max_delay)
    }

    /// Number of waits a fully failing run goes through.
    pub fn max_waits(&self) -> usize {
        self.max_attempts.saturating_sub(1)
    }
}

/// Run `op` until it succeeds or the attempt budget is spent.
///
/// `op` receives the 1-indexed attempt number. Each failure is logged; the
/// last error is returned once `max_attempts` attempts have failed. There is
/// no wait after the final attempt.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, operation: &str, mut op: F) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                error!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Attempt failed, retry budget exhausted"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
