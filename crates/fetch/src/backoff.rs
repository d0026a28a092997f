//! Capped exponential backoff with full jitter.
//!
//! Each delay is drawn from `[0.5 × d, 1.0 × d]` where
//! `d = min(base · 2^attempt, cap)`. An optional async callback runs
//! between attempts (the extract stages use it to reload a page).
//! Dropping the returned future drops the retry loop with it, so the
//! helper stays cancellation-safe.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

/// Retry shape: attempt count, base delay, and delay cap.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let exponential = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        let capped = exponential.min(self.max_delay);
        let jitter = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0.5..=1.0)
        };
        capped.mul_f64(jitter)
    }
}

/// Run `op` until it succeeds or `max_retries` attempts are spent,
/// sleeping a jittered exponential delay and running `on_retry`
/// between attempts.
pub async fn retry_with_backoff<T, E, Op, Fut, Retry, RetryFut>(
    policy: BackoffPolicy,
    mut op: Op,
    mut on_retry: Retry,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Retry: FnMut() -> RetryFut,
    RetryFut: Future<Output = ()>,
{
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt + 1 >= attempts {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying");
                tokio::time::sleep(delay).await;
                on_retry().await;
                attempt += 1;
            }
        }
    }
}

/// [`retry_with_backoff`] without an inter-attempt callback.
pub async fn retry<T, E, Op, Fut>(policy: BackoffPolicy, op: Op) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_backoff(policy, op, || async {}).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick_policy(max_retries: u32) -> BackoffPolicy {
        BackoffPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<u32, &str> = retry(quick_policy(5), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("flaky")
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), &str> = retry(quick_policy(4), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("always")
            }
        })
        .await;
        assert_eq!(result.unwrap_err(), "always");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn on_retry_runs_between_attempts_only() {
        let retries = Arc::new(AtomicU32::new(0));
        let observed = retries.clone();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), &str> = retry_with_backoff(
            quick_policy(3),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("always")
                }
            },
            move || {
                let observed = observed.clone();
                async move {
                    observed.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
        .await;
        assert!(result.is_err());
        // 3 attempts, 2 gaps.
        assert_eq!(retries.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn delay_is_capped_and_jittered() {
        let policy = BackoffPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        };
        for attempt in 0..10 {
            let d = min_max_for(policy, attempt);
            let actual = policy.delay_for(attempt);
            assert!(actual >= d.0, "attempt {attempt}: {actual:?} < {:?}", d.0);
            assert!(actual <= d.1, "attempt {attempt}: {actual:?} > {:?}", d.1);
        }
    }

    fn min_max_for(policy: BackoffPolicy, attempt: u32) -> (Duration, Duration) {
        let exponential = policy
            .base_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(policy.max_delay)
            .min(policy.max_delay);
        (exponential.mul_f64(0.5), exponential)
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_still_attempts_once() {
        let result: Result<u32, &str> = retry(quick_policy(0), || async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }
}
