//! Retry with exponential backoff for transient store failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use chathub_core::config::SessionConfig;
use chathub_core::result::AppResult;

/// How many times, and how patiently, to retry a store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Policy from the session config.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            attempts: config.store_retry_attempts.max(1),
            base_delay: Duration::from_millis(config.store_retry_base_ms),
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or
    /// the attempts are used up.
    pub async fn run<T, F, Fut>(&self, what: &'static str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.kind.is_transient() && attempt < self.attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient credential store failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use chathub_core::error::{AppError, ErrorKind};

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy {
            attempts: 4,
            base_delay: Duration::from_millis(50),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(10),
        };
        let result = policy
            .run("lookup", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AppError::service_unavailable("pool timed out"))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: AppResult<()> = RetryPolicy::default()
            .run("lookup", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::validation("bad row"))
            })
            .await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Validation);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: AppResult<()> = RetryPolicy {
            attempts: 2,
            base_delay: Duration::from_millis(10),
        }
        .run("lookup", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::database("connection reset"))
        })
        .await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Database);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
