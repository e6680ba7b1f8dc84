//! Bounded retry and timeout helpers
//!
//! Retries use a fixed delay between attempts. The delay goes through a [`Sleeper`]
//! so tests can substitute a clock that never actually waits.

use crate::error::{ErrorContext, KbChatError, KbChatResult};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first one
    pub max_retries: usize,
    /// Constant pause between two attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Total number of attempts, first one included
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }
}

/// Source of the pause between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately, for tests and tooling
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSleeper;

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Run `operation` until it succeeds, fails with a non-recoverable error, or the
/// policy's attempts are used up. The last error is returned on exhaustion.
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation_name: &str,
    mut operation: F,
) -> KbChatResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = KbChatResult<T>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;

        debug!(
            operation = operation_name,
            attempt = attempt,
            max_attempts = max_attempts,
            "Attempting operation"
        );

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_recoverable() => {
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %err,
                    "Operation failed with a non-recoverable error"
                );
                return Err(err);
            }
            Err(err) => {
                if attempt >= max_attempts {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %err,
                        "Operation failed after all retry attempts"
                    );
                    return Err(err);
                }

                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %err,
                    delay_ms = policy.delay.as_millis() as u64,
                    "Operation failed, retrying"
                );

                sleeper.sleep(policy.delay).await;
            }
        }
    }
}

/// Timeout wrapper for async operations
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> KbChatResult<T>
where
    F: Future<Output = KbChatResult<T>>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => result,
        Err(_) => Err(KbChatError::Timeout {
            operation: operation_name.to_string(),
            duration_ms: timeout_ms,
            context: ErrorContext::new("retry")
                .with_operation("timeout")
                .with_metadata("timeout_ms", &timeout_ms.to_string())
                .with_suggestion("Verify service availability"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn non_recoverable_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(5));

        let result: KbChatResult<()> = retry_with_policy(&policy, &NoopSleeper, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(crate::config_error!("bad key", "test")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(0, Duration::from_millis(5));

        let result: KbChatResult<()> = retry_with_policy(&policy, &NoopSleeper, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(network_error!("down", "test")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_policy_allows_three_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay, Duration::from_millis(1000));
    }
}
