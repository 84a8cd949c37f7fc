use crate::utils::error::{CheckInError, Result};
use std::future::Future;
use std::time::Duration;

/// Bounded retry with a fixed backoff, for transport and navigation
/// flakiness only. A classified negative outcome is a result, not a
/// transport failure, and is never routed through here.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Drive `operation` until it succeeds, a non-retryable error surfaces,
    /// or the attempt budget runs out. The final error is escalated as-is.
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error: Option<CheckInError> = None;

        for attempt in 1..=self.max_attempts.max(1) {
            tracing::debug!("{}: attempt {}/{}", what, attempt, self.max_attempts);

            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(
                        "{}: attempt {}/{} failed: {}, retrying in {:?}",
                        what,
                        attempt,
                        self.max_attempts,
                        err,
                        self.backoff
                    );
                    last_error = Some(err);
                    tokio::time::sleep(self.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or(CheckInError::Processing {
            message: format!("{}: no attempts executed", what),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky_error() -> CheckInError {
        CheckInError::Navigation {
            attempts: 1,
            message: "connection reset".to_string(),
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = policy
            .run("op", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_retryable_errors() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = policy
            .run("op", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(flaky_error())
                    } else {
                        Ok("eventually")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "eventually");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts_and_escalates() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .run("op", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(flaky_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .run("op", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(CheckInError::Auth {
                        status: 401,
                        body: "bad credentials".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(CheckInError::Auth { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
