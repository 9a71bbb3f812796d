//! Bounded exponential-backoff retry around a single extraction call.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::client::ExtractionError;

/// Retry policy for transient extraction failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Jitter fraction (0.0 disables) applied to each delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following failed attempt number `attempt`
    /// (zero-based): `base_delay * 2^attempt`, capped, with jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let capped = exp.min(self.max_delay.as_secs_f64());

        let range = capped * self.jitter;
        let with_jitter = if range > 0.0 {
            (capped + rand::random_range(-range..range)).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(with_jitter)
    }
}

/// Terminal failure of a retried extraction.
#[derive(Debug, Error)]
pub enum RetryError {
    /// Transient failures persisted through every allowed attempt.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: ExtractionError },

    /// Non-transient failure, surfaced without retrying.
    #[error("{0}")]
    Fatal(ExtractionError),
}

impl RetryError {
    pub fn error(&self) -> &ExtractionError {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Fatal(e) => e,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.error().kind()
    }
}

/// Run `op` until it succeeds, fails non-transiently, or exhausts the
/// policy's attempt budget.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExtractionError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(RetryError::Fatal(e)),
            Err(e) => {
                attempt += 1;
                if attempt >= policy.max_attempts.max(1) {
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }
                let delay = policy.backoff(attempt - 1);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient extraction failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter: 0.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_needs_one_call() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ExtractionError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_transient_failure_uses_exact_attempt_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExtractionError::Timeout) }
        })
        .await;

        match result.unwrap_err() {
            RetryError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, ExtractionError::Timeout));
            }
            other => panic!("expected exhausted, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_response_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExtractionError::MalformedResponse("not json".to_string())) }
        })
        .await;

        assert!(matches!(result.unwrap_err(), RetryError::Fatal(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(ExtractionError::RateLimited)
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            jitter: 0.0,
        };
        assert_eq!(policy.backoff(0), Duration::from_secs(2));
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(2), Duration::from_secs(8));
        assert_eq!(policy.backoff(3), Duration::from_secs(10));
        assert_eq!(policy.backoff(10), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_jitter_stays_in_range() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        };
        for _ in 0..50 {
            let delay = policy.backoff(1).as_secs_f64();
            assert!((3.6..=4.4).contains(&delay), "delay out of range: {}", delay);
        }
    }
}
