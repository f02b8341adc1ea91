//! Exponential backoff retry with jitter.
//!
//! Grounded on `original_source/packages/adapters/src/adapters/retry.py`:
//! `delay(attempt) = min(base * base^attempt, max_delay)`, jittered to a
//! uniform sample in `[0, delay]`. Only a caller-supplied predicate decides
//! whether an error is retryable — this crate has no opinion on what
//! "transient transport" means for a given adapter.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Compute the backoff delay for a given (0-indexed) attempt, before
    /// jitter is applied.
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let secs = self.base_delay.as_secs_f64() * self.exponential_base.powi(attempt as i32);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Sample the actual delay to sleep for this attempt, applying jitter
    /// (uniform in `[0, raw_delay]`) if enabled.
    pub fn delay(&self, attempt: u32) -> Duration {
        let raw = self.raw_delay(attempt);
        if self.jitter {
            let frac: f64 = rand::thread_rng().gen_range(0.0..=1.0);
            Duration::from_secs_f64(raw.as_secs_f64() * frac)
        } else {
            raw
        }
    }

    /// Run `f`, retrying on errors the caller's `is_retryable` predicate
    /// accepts, up to `max_retries` additional attempts. The last error
    /// propagates once the budget is exhausted or the predicate rejects it.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation_name: &str,
        mut f: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt >= self.max_retries || !is_retryable(&e) {
                        tracing::error!(
                            operation = operation_name,
                            attempt,
                            "retry budget exhausted or non-retryable error"
                        );
                        return Err(e);
                    }
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn raw_delay_grows_exponentially_and_caps() {
        let p = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            exponential_base: 2.0,
            jitter: false,
        };
        assert_eq!(p.raw_delay(0), Duration::from_millis(10));
        assert_eq!(p.raw_delay(1), Duration::from_millis(20));
        assert_eq!(p.raw_delay(2), Duration::from_millis(40));
        // 10 * 2^4 = 160, capped at 100
        assert_eq!(p.raw_delay(4), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let p = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            exponential_base: 2.0,
            jitter: false,
        };
        let calls = AtomicU32::new(0);
        let result = p
            .run(
                "test-op",
                || async {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                },
                |_e| true,
            )
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn propagates_last_error_after_exhaustion() {
        let p = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            exponential_base: 2.0,
            jitter: false,
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = p
            .run(
                "test-op",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("always fails")
                },
                |_e| true,
            )
            .await;
        assert_eq!(result, Err("always fails"));
        // initial attempt + 2 retries = 3 calls
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_propagates_immediately() {
        let p = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = p
            .run(
                "test-op",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("fatal")
                },
                |_e| false,
            )
            .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
