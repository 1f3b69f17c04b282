//! Retry logic with fixed backoff
//!
//! Each agent gets a bounded number of attempts, separated by a constant
//! pause. Every failure is retried; the caller decides what exhaustion means.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Pause between consecutive attempts
    pub backoff: Duration,

    /// Time budget handed to each attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a retried operation plus the number of attempts it took
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_attempts: u32, backoff: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
            attempt_timeout,
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Execute an async operation with retry logic
    ///
    /// `operation` receives the 1-based attempt number. Returns the first
    /// success, or the last error once `max_attempts` is exhausted.
    pub async fn execute<F, Fut, T, E>(&self, operation_name: &str, mut operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("Attempt {}/{} for {}", attempt, max_attempts, operation_name);

            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded after {} attempts", operation_name, attempt);
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    warn!(
                        "{} attempt {}/{} failed: {}",
                        operation_name, attempt, max_attempts, e
                    );

                    if attempt >= max_attempts {
                        return RetryOutcome {
                            result: Err(e),
                            attempts: attempt,
                        };
                    }
                }
            }

            sleep(self.backoff).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.backoff, Duration::from_millis(500));
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }

    #[tokio::test]
    async fn test_first_success_stops() {
        let policy = RetryPolicy::default();
        let outcome = policy
            .execute("op", |_| async { Ok::<_, String>(7) })
            .await;
        assert_eq!(outcome.result.unwrap(), 7);
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success_waits_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(1));
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let outcome = policy
            .execute("op", |attempt| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 { Err("boom".to_string()) } else { Ok(attempt) }
                }
            })
            .await;

        assert_eq!(outcome.result.unwrap(), 3);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(500), Duration::from_secs(1));
        let start = Instant::now();

        let outcome = policy
            .execute("op", |attempt| async move { Err::<(), _>(format!("failure {attempt}")) })
            .await;

        assert_eq!(outcome.result.unwrap_err(), "failure 2");
        assert_eq!(outcome.attempts, 2);
        // No pause after the final attempt
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::from_secs(1));
        let outcome = policy
            .execute("op", |_| async { Err::<(), _>("nope") })
            .await;
        assert_eq!(outcome.attempts, 1);
    }
}
