/*!
 * Retry with exponential backoff.
 *
 * `RetryPolicy` owns the attempt budget and delay schedule; the caller
 * supplies the operation and a predicate deciding which errors are worth
 * another attempt. With the default policy the delays are 1s, 2s, 4s, ...
 */

use log::warn;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Default delay before the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default growth factor between consecutive delays
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Factor applied to the delay after each further failure
    pub multiplier: f64,
    /// Upper bound for any single delay
    pub max_delay: Option<Duration>,
    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: None,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` total attempts
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// Create a policy from a retry count (`retry_attempts + 1` total attempts)
    pub fn from_retry_attempts(retry_attempts: u32) -> Self {
        Self::new(retry_attempts.saturating_add(1))
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after the given (1-based) failed attempt, before jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self
            .base_delay
            .mul_f64(self.multiplier.powi(exponent));

        match self.max_delay {
            Some(max) if delay > max => max,
            _ => delay,
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let factor = rand::rng().random_range(0.0..=0.25);
        delay + delay.mul_f64(factor)
    }

    /// Run `operation` until it succeeds, the budget is spent, or it fails
    /// with an error `is_retryable` rejects.
    ///
    /// The operation receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= max_attempts || !is_retryable(&error) {
                        return Err(RetryError {
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    let delay = self.jittered(self.delay_for_attempt(attempt));
                    warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:.1}s",
                        attempt,
                        max_attempts,
                        error,
                        delay.as_secs_f64()
                    );

                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// Final failure of a retried operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryError<E> {
    /// Attempts made before giving up
    pub attempts: u32,
    /// Error returned by the last attempt
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed after {} attempt(s): {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}
