//! Bounded retry policy for transient upstream failures.
//!
//! Deliberately simple: a fixed attempt count and a fixed inter-attempt
//! delay, no jitter, no backoff. The policy does not distinguish error
//! kinds; callers keep terminal stages (validation, resolution, selection)
//! outside the policy instead.

use std::time::Duration;

use tracing::warn;

/// Default number of attempts before the last error is propagated.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default fixed delay between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// A bounded, fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with an explicit attempt count and delay.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            delay,
        }
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// The delay is slept between attempts only, never after the last one.
    /// On exhaustion the final error is propagated unchanged.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `operation`.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);

        for attempt in 1..=attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts => {
                    warn!(attempt, max_attempts = attempts, error = %err, "attempt failed, retrying");
                    tokio::time::sleep(self.delay).await;
                }
                Err(err) => return Err(err),
            }
        }

        unreachable!("loop either returns a value or the final error")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Counter-backed operation that fails until `successful_attempt`.
    macro_rules! failing_until {
        ($calls:ident, $successful_attempt:expr) => {{
            let counter = Arc::clone(&$calls);
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt >= $successful_attempt {
                        Ok::<u32, String>(attempt)
                    } else {
                        Err(format!("attempt {attempt} failed"))
                    }
                }
            }
        }};
    }

    #[tokio::test]
    async fn succeeds_first_try_without_sleeping() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = failing_until!(calls, 1);
        let value = RetryPolicy::default().run(op).await.expect("must succeed");
        assert_eq!(value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds_with_exact_attempt_count() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = failing_until!(calls, 3);
        let value = RetryPolicy::default().run(op).await.expect("must succeed");
        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_propagates_last_error_unchanged() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = failing_until!(calls, u32::MAX);
        let err = RetryPolicy::default().run(op).await.expect_err("must fail");
        assert_eq!(err, "attempt 3 failed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_the_configured_delay_between_attempts() {
        let start = tokio::time::Instant::now();
        let calls = Arc::new(AtomicU32::new(0));
        let op = failing_until!(calls, 3);
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        policy.run(op).await.expect("must succeed");
        // Two failures -> two inter-attempt delays.
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn zero_attempts_is_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        assert_eq!(policy.max_attempts, 1);
        let calls = Arc::new(AtomicU32::new(0));
        let op = failing_until!(calls, u32::MAX);
        let _ = policy.run(op).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
