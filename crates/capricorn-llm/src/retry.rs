//! Rate-limit aware retry with capped exponential backoff.
//!
//! Only quota exhaustion is retried; every other failure is returned to the
//! caller on the first attempt. There is no attempt ceiling: a call that keeps
//! hitting the quota keeps waiting at the capped delay.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::backend::LlmError;

/// Suspends the current task. Injected so tests can observe delays without
/// waiting for them.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self { base_delay, max_delay }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// never above `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds or fails with something other than a rate
    /// limit.
    pub async fn run<T, F, Fut>(&self, sleeper: &dyn Sleeper, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, LlmError>> + Send,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_rate_limited() => {
                    attempt = attempt.saturating_add(1);
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "Rate limited by model provider; backing off"
                    );
                    sleeper.sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Duration>>);

    #[async_trait]
    impl Sleeper for Recorder {
        async fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn test_delay_doubles_then_caps() {
        let p = RetryPolicy::default();
        let secs: Vec<u64> = (1..=8).map(|n| p.delay_for_attempt(n).as_secs()).collect();
        assert_eq!(secs, vec![5, 10, 20, 40, 80, 160, 300, 300]);
    }

    #[test]
    fn test_delay_huge_attempt_is_capped() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for_attempt(u32::MAX), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_retries_rate_limit_until_success() {
        let sleeper = Recorder::default();
        let calls = AtomicU32::new(0);
        let out = RetryPolicy::default()
            .run(&sleeper, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 4 {
                        Err(LlmError::RateLimitExceeded("429 RESOURCE_EXHAUSTED".into()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(out, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        let waited: Vec<u64> = sleeper.0.lock().unwrap().iter().map(|d| d.as_secs()).collect();
        assert_eq!(waited, vec![5, 10, 20, 40]);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let sleeper = Recorder::default();
        let calls = AtomicU32::new(0);
        let res: Result<(), _> = RetryPolicy::default()
            .run(&sleeper, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LlmError::ApiError { status: 500, message: "boom".into() }) }
            })
            .await;

        assert!(matches!(res, Err(LlmError::ApiError { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.0.lock().unwrap().is_empty());
    }
}
