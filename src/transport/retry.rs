//! Bounded retry without backoff

use super::TransportError;
use std::future::Future;

/// How many times a failed request is repeated.
///
/// A request is attempted once plus `max_retries` more times when the
/// failure is transient. Attempts follow each other immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl RetryPolicy {
    /// Create a policy allowing `max_retries` repeats
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Total attempts this policy allows
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget
    /// is spent.
    pub async fn run<T, F, Fut>(&self, target: &str, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.attempts() {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        "Attempt {}/{} to {} failed: {}",
                        attempt,
                        self.attempts(),
                        target,
                        e
                    );
                    last_error = e.to_string();
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!(
            "Connection to {} failed {} times, giving up",
            target,
            self.attempts()
        );
        Err(TransportError::RetriesExhausted {
            target: target.to_string(),
            attempts: self.attempts(),
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn io_error() -> TransportError {
        TransportError::Io {
            target: "test".into(),
            message: "connection refused".into(),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_makes_retries_plus_one_attempts() {
        let policy = RetryPolicy::new(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(io_error())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(
            result,
            Err(TransportError::RetriesExhausted { attempts: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let policy = RetryPolicy::new(0);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(io_error())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::InvalidRequest {
                    target: "test".into(),
                    message: "relative URL without a base".into(),
                })
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(TransportError::InvalidRequest { .. })));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result = policy
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(io_error())
                } else {
                    Ok("body")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
