//! Retry policy and executor

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::backoff::{BackoffCalculator, BackoffStrategy};

/// Retry policy configuration
///
/// Loadable from YAML; omitted fields take the [`Default`] values, which poll
/// every 500ms for up to 30s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial delay between retries
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Backoff strategy
    pub backoff_strategy: BackoffStrategy,

    /// Whether to add jitter to retry delays
    pub jitter: bool,

    /// Overall time budget measured from the first attempt
    #[serde(default, with = "humantime_serde")]
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: u32::MAX,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_strategy: BackoffStrategy::Fixed,
            jitter: false,
            deadline: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryPolicy {
    /// Poll at a fixed interval until the deadline elapses
    pub fn polling(interval: Duration, deadline: Duration) -> Self {
        Self {
            max_attempts: u32::MAX,
            initial_delay: interval,
            max_delay: interval,
            backoff_strategy: BackoffStrategy::Fixed,
            jitter: false,
            deadline: Some(deadline),
        }
    }

    /// Calculate delay for a specific attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        BackoffCalculator::new(
            self.backoff_strategy.clone(),
            self.initial_delay,
            self.max_delay,
            self.jitter,
        )
        .calculate_delay(attempt)
    }
}

/// Trait for errors that can be retried
pub trait Retryable {
    /// Whether this error is retryable
    fn is_retryable(&self) -> bool;
}

/// Retry executor
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute a function with retry logic
    pub async fn execute<F, Fut, T, E>(&self, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            debug!("Executing attempt {} of {}", attempt, self.policy.max_attempts);

            let error = match f(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                warn!("Operation failed with non-retryable error: {}", error);
                return Err(RetryError::NonRetryableError(error));
            }

            if attempt >= self.policy.max_attempts {
                warn!("Operation failed after {} attempts: {}", attempt, error);
                return Err(RetryError::MaxAttemptsExceeded {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let mut delay = self.policy.delay_for_attempt(attempt);
            if let Some(deadline) = self.policy.deadline {
                let elapsed = started.elapsed();
                if elapsed >= deadline {
                    warn!(
                        "Operation still failing after {:?} ({} attempts): {}",
                        elapsed, attempt, error
                    );
                    return Err(RetryError::DeadlineExceeded {
                        attempts: attempt,
                        elapsed,
                        last_error: error,
                    });
                }
                // Last attempt lands on the deadline rather than past it
                delay = delay.min(deadline - elapsed);
            }

            debug!("Attempt {} failed: {}. Retrying in {:?}", attempt, error, delay);
            sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Retry error types
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts ({attempts}) exceeded. Last error: {last_error}")]
    MaxAttemptsExceeded { attempts: u32, last_error: E },

    /// Time budget exhausted
    #[error("Gave up after {elapsed:?} ({attempts} attempts). Last error: {last_error}")]
    DeadlineExceeded {
        attempts: u32,
        elapsed: Duration,
        last_error: E,
    },

    /// Non-retryable error encountered
    #[error("Non-retryable error: {0}")]
    NonRetryableError(E),
}

impl<E> RetryError<E> {
    /// Get the underlying error
    pub fn into_inner(self) -> E {
        match self {
            RetryError::MaxAttemptsExceeded { last_error, .. } => last_error,
            RetryError::DeadlineExceeded { last_error, .. } => last_error,
            RetryError::NonRetryableError(error) => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct TestError {
        retryable: bool,
        message: String,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn linear(max_attempts: u32, delay: Duration) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: delay,
            max_delay: delay * max_attempts,
            backoff_strategy: BackoffStrategy::Linear,
            deadline: None,
            ..Default::default()
        }
    }

    fn transient() -> TestError {
        TestError {
            retryable: true,
            message: "not yet".to_string(),
        }
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let executor = RetryExecutor::new(linear(3, Duration::from_millis(5)));

        let result = executor
            .execute(|_| {
                let count = counter_clone.fetch_add(1, Ordering::Relaxed);
                async move {
                    if count < 2 {
                        Err(transient())
                    } else {
                        Ok("ready")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ready");
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_retry_max_attempts_exceeded() {
        let executor = RetryExecutor::new(linear(2, Duration::from_millis(1)));

        let result: Result<(), _> = executor.execute(|_| async { Err(transient()) }).await;

        assert!(matches!(
            result.unwrap_err(),
            RetryError::MaxAttemptsExceeded { attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let executor = RetryExecutor::new(RetryPolicy::default());

        let result: Result<(), _> = executor
            .execute(|_| {
                counter_clone.fetch_add(1, Ordering::Relaxed);
                async {
                    Err(TestError {
                        retryable: false,
                        message: "fatal".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result.unwrap_err(), RetryError::NonRetryableError(_)));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_policy_from_yaml() {
        let policy: RetryPolicy = serde_yaml::from_str(
            "initial_delay: 100ms\nmax_delay: 400ms\nbackoff_strategy:\n  type: exponential\n  base: 2.0\ndeadline: 2s\n",
        )
        .unwrap();
        assert_eq!(policy.backoff_strategy, BackoffStrategy::Exponential { base: 2.0 });
        assert_eq!(policy.max_attempts, u32::MAX);
        assert!(!policy.jitter);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(400));

        // 100 + 200 + 400 + 400 + 400 + 400 = 1900ms, then one clamped wait
        let started = Instant::now();
        let result: Result<(), _> = RetryExecutor::new(policy)
            .execute(|_| async { Err(transient()) })
            .await;
        match result.unwrap_err() {
            RetryError::DeadlineExceeded { attempts, .. } => assert_eq!(attempts, 8),
            other => panic!("unexpected error: {}", other),
        }
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn test_default_policy_polls_with_deadline() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_strategy, BackoffStrategy::Fixed);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(9), Duration::from_millis(500));
        assert_eq!(policy.deadline, Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_policy_honours_deadline() {
        let executor = RetryExecutor::new(RetryPolicy::polling(
            Duration::from_millis(500),
            Duration::from_secs(2),
        ));
        let started = Instant::now();

        let result: Result<(), _> = executor.execute(|_| async { Err(transient()) }).await;

        let elapsed = started.elapsed();
        match result.unwrap_err() {
            RetryError::DeadlineExceeded { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("unexpected error: {}", other),
        }
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_millis(2600));
    }
}
