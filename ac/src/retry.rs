//! Bounded retry with a per-attempt timeout
//!
//! Every external tool call goes through [`execute_cancellable`]: each attempt
//! races the operation against a timer, failed attempts are paced by a fixed
//! delay, and a timed-out attempt's in-flight work is dropped so its eventual
//! result is never observed.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fixed delay between attempts (not subject to the per-attempt timeout)
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Errors from retry execution
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl RetryError {
    /// Whether this error represents an exhausted attempt budget
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

/// Immutable retry parameters, supplied per call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt budget (always >= 1)
    pub max_attempts: u32,

    /// Timer armed for each individual attempt
    pub per_attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is clamped to at least 1.
    ///
    /// A zero `per_attempt_timeout` is a caller contract violation.
    pub fn new(max_attempts: u32, per_attempt_timeout: Duration) -> Self {
        debug_assert!(!per_attempt_timeout.is_zero(), "per-attempt timeout must be positive");
        Self {
            max_attempts: max_attempts.max(1),
            per_attempt_timeout,
        }
    }

    /// Policy for exactly one timed attempt (no delay, no retry)
    pub fn single(per_attempt_timeout: Duration) -> Self {
        Self::new(1, per_attempt_timeout)
    }
}

/// Run `op` under the given policy without external cancellation.
pub async fn execute<T, E, F, Fut>(policy: RetryPolicy, op: F) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    execute_cancellable(policy, &CancellationToken::new(), op).await
}

/// Run `op` under the given policy, aborting between and during attempts when
/// `cancel` fires.
///
/// Attempt counter starts at 1. Each attempt races `op()` against the policy's
/// per-attempt timer; when the timer fires first the attempt's future is
/// dropped and the attempt is recorded as a timeout. On success at any attempt
/// the value is returned immediately. Exhausting the budget yields
/// [`RetryError::Exhausted`] wrapping the last observed error message.
pub async fn execute_cancellable<T, E, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            debug!(attempt, "retry: cancelled before attempt");
            return Err(RetryError::Cancelled);
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(attempt, "retry: cancelled mid-attempt");
                return Err(RetryError::Cancelled);
            }
            outcome = tokio::time::timeout(policy.per_attempt_timeout, op()) => outcome,
        };

        match outcome {
            Ok(Ok(value)) => {
                debug!(attempt, "retry: attempt succeeded");
                return Ok(value);
            }
            Ok(Err(e)) => {
                last_error = e.to_string();
                warn!(attempt, max_attempts = policy.max_attempts, error = %last_error, "retry: attempt failed");
            }
            Err(_) => {
                last_error = RetryError::Timeout(policy.per_attempt_timeout).to_string();
                warn!(attempt, max_attempts = policy.max_attempts, "retry: attempt timed out");
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }

    Err(RetryError::Exhausted {
        attempts: policy.max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    type BoxedAttempt = std::pin::Pin<Box<dyn Future<Output = Result<u32, String>> + Send>>;

    fn flaky(fail_first: u32) -> (std::sync::Arc<AtomicU32>, impl FnMut() -> BoxedAttempt) {
        let calls = std::sync::Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let op = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                if n <= fail_first {
                    Err(format!("boom {}", n))
                } else {
                    Ok(n)
                }
            }) as BoxedAttempt
        };
        (calls, op)
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_first_attempt_without_delay() {
        let (calls, op) = flaky(0);
        let start = tokio::time::Instant::now();

        let value = execute(RetryPolicy::new(3, Duration::from_secs(5)), op).await.unwrap();

        assert_eq!(value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_nth_attempt_with_exactly_n_invocations() {
        let (calls, op) = flaky(2);

        let value = execute(RetryPolicy::new(5, Duration::from_secs(5)), op).await.unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_budget_and_reports_attempt_count() {
        let (calls, op) = flaky(u32::MAX);

        let err = execute(RetryPolicy::new(3, Duration::from_secs(5)), op).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            RetryError::Exhausted { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("boom 3"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_timeouts_elapse_budget_plus_delays() {
        let timeout = Duration::from_secs(2);
        let start = tokio::time::Instant::now();

        let err = execute(RetryPolicy::new(3, timeout), || async {
            std::future::pending::<Result<(), String>>().await
        })
        .await
        .unwrap_err();

        // 3 timed attempts plus 2 inter-attempt delays
        assert_eq!(start.elapsed(), timeout * 3 + RETRY_DELAY * 2);
        match err {
            RetryError::Exhausted { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_has_no_delay() {
        let timeout = Duration::from_secs(1);
        let start = tokio::time::Instant::now();

        let err = execute(RetryPolicy::single(timeout), || async {
            std::future::pending::<Result<(), String>>().await
        })
        .await
        .unwrap_err();

        assert_eq!(start.elapsed(), timeout);
        assert!(err.is_exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_attempt_result_is_discarded() {
        // The slow first attempt would eventually produce 1, but the retry
        // must only ever observe the second attempt's value.
        let calls = std::sync::Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let value = execute(RetryPolicy::new(2, Duration::from_secs(1)), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok::<u32, String>(n)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (calls, op) = flaky(0);

        let err = execute_cancellable(RetryPolicy::new(3, Duration::from_secs(5)), &cancel, op)
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_attempt_drops_work() {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            child.cancel();
        });

        let err = execute_cancellable(RetryPolicy::new(3, Duration::from_secs(30)), &cancel, || async {
            std::future::pending::<Result<(), String>>().await
        })
        .await
        .unwrap_err();

        assert!(matches!(err, RetryError::Cancelled));
    }

    #[test]
    fn test_policy_clamps_zero_attempts() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 1);
    }
}
