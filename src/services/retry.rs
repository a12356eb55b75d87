use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::AppResult;

/// Exponential backoff for upstream calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the zero-based `attempt` failed
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Runs `operation` until it succeeds, fails permanently or attempts run out
    ///
    /// Non-transient errors (see [`AppError::is_transient`](crate::error::AppError::is_transient))
    /// are returned on the spot.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt + 1 < self.max_attempts && err.is_transient() => {
                    let delay = self.delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        call = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Upstream call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Fixed-interval pacing of upstream calls shared by every engine
///
/// Each caller reserves the next free slot (at least `interval` after the
/// previously reserved one) and sleeps until it. The lock is only held while
/// reserving, so waiting callers do not block each other.
#[derive(Debug, Clone)]
pub struct RequestScheduler {
    interval: Duration,
    last_slot: Arc<Mutex<Option<Instant>>>,
}

impl RequestScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for this caller's slot
    pub async fn wait(&self) {
        let slot = {
            let mut last = self.last_slot.lock().await;
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => (prev + self.interval).max(now),
                None => now,
            };
            *last = Some(slot);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }

    /// Paces a call through the scheduler, retrying it with `policy`
    ///
    /// Every attempt, retries included, takes its own slot.
    pub async fn call<T, F, Fut>(&self, policy: &RetryPolicy, label: &str, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        policy
            .run(label, || {
                let fut = operation();
                async move {
                    self.wait().await;
                    fut.await
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(5));
        assert_eq!(policy.delay(40), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = RetryPolicy::default()
            .run("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(AppError::ExternalApi("503".to_string()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(assert_ok!(result), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: AppResult<()> = RetryPolicy::default()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::ExternalApi("timeout".to_string()))
            })
            .await;

        assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: AppResult<()> = RetryPolicy::default()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::NotFound("movie 1".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_spaces_calls() {
        let scheduler = RequestScheduler::new(Duration::from_millis(300));
        let started = Instant::now();

        scheduler.wait().await;
        assert_eq!(started.elapsed(), Duration::ZERO);

        scheduler.wait().await;
        scheduler.wait().await;
        assert_eq!(started.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_does_not_delay_after_idle_period() {
        let scheduler = RequestScheduler::new(Duration::from_millis(300));

        scheduler.wait().await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let before = Instant::now();
        scheduler.wait().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_get_distinct_slots() {
        let scheduler = RequestScheduler::new(Duration::from_millis(300));
        let started = Instant::now();

        let (a, b, c) = tokio::join!(
            async { scheduler.wait().await; started.elapsed() },
            async { scheduler.wait().await; started.elapsed() },
            async { scheduler.wait().await; started.elapsed() },
        );

        let mut slots = vec![a, b, c];
        slots.sort();
        assert_eq!(
            slots,
            vec![Duration::ZERO, Duration::from_millis(300), Duration::from_millis(600)]
        );
    }
}
