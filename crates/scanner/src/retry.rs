use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ScanError;

/// Strategy for computing delay between retry attempts.
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// Exponential backoff: `base * multiplier^attempt`, optionally with
    /// deterministic jitter.
    Exponential {
        /// Initial delay before the first retry.
        base: Duration,
        /// Upper bound on the computed delay.
        max: Duration,
        /// Factor applied on each successive attempt.
        multiplier: f64,
        /// When `true`, a deterministic jitter factor is applied so that
        /// concurrent scanners do not all retry at the same instant.
        jitter: bool,
    },
    /// Constant delay between every retry attempt.
    Constant {
        /// Fixed delay duration.
        delay: Duration,
    },
}

impl RetryStrategy {
    /// Compute the delay duration for the given zero-based `attempt` number.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Exponential {
                base,
                max,
                multiplier,
                jitter,
            } => {
                let base_secs = base.as_secs_f64();
                // `attempt` is a small retry count, far below i32::MAX.
                #[allow(clippy::cast_possible_wrap)]
                let raw = base_secs * multiplier.powi(attempt as i32);

                let adjusted = if *jitter {
                    // Deterministic jitter: vary by +0% to +40% based on the
                    // attempt number. This spreads retries across a window
                    // without requiring a random number generator.
                    let jitter_factor = 1.0 + 0.1 * f64::from(attempt % 5);
                    raw * jitter_factor
                } else {
                    raw
                };

                let clamped = adjusted.min(max.as_secs_f64());
                Duration::from_secs_f64(clamped)
            }
            Self::Constant { delay } => *delay,
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Retry policy: a backoff strategy plus the per-scan attempt budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// The backoff curve.
    pub strategy: RetryStrategy,
    /// Total attempts allowed, including the first (default 5).
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::default(),
            max_attempts: 5,
        }
    }
}

/// Drive an operation through the retry policy.
///
/// Only [retryable](ScanError::is_retryable) failures are retried;
/// everything else returns immediately. Cancellation is honored before
/// every attempt and during every backoff sleep.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    ctx: &CancellationToken,
    mut operation: F,
) -> Result<T, ScanError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ScanError>>,
{
    let mut attempt = 0u32;
    loop {
        if ctx.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.strategy.delay_for(attempt);
                debug!(attempt, ?delay, %error, "retrying after transient scan failure");
                tokio::select! {
                    () = ctx.cancelled() => return Err(ScanError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
