//! Bounded retry with exponential backoff.
//!
//! Delay before attempt `n` (1-based retry number) is `base_delay * 2^(n-1)`.

use super::provider::{FetchError, FetchResult};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay slept before retry number `retry` (1-based). Zero for the first attempt.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry - 1))
    }

    /// Total time spent sleeping if every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_retries)
            .map(|r| self.delay_for(r))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Run `op` until it succeeds, returns a non-retryable error, or attempts
    /// are exhausted. `op` receives the zero-based attempt index.
    pub fn run<T>(
        &self,
        retryable: impl Fn(&FetchError) -> bool,
        mut op: impl FnMut(u32) -> FetchResult<T>,
    ) -> FetchResult<T> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                std::thread::sleep(self.delay_for(attempt));
            }
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && retryable(&e) => {
                    debug!(attempt, error = %e, "retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1))
    }

    #[test]
    fn delays_double() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::ZERO);
        assert_eq!(p.delay_for(1), Duration::from_millis(500));
        assert_eq!(p.delay_for(2), Duration::from_millis(1000));
        assert_eq!(p.delay_for(3), Duration::from_millis(2000));
        assert_eq!(p.total_backoff(), Duration::from_millis(3500));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = fast(3).run(FetchError::is_transport, |_| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(FetchError::Network("reset".into()))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let calls = Cell::new(0);
        let result: FetchResult<()> = fast(2).run(FetchError::is_transport, |_| {
            calls.set(calls.get() + 1);
            Err(FetchError::Network("down".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn non_retryable_error_returns_immediately() {
        let calls = Cell::new(0);
        let result: FetchResult<()> = fast(5).run(FetchError::is_transport, |_| {
            calls.set(calls.get() + 1);
            Err(FetchError::Parse("bad".into()))
        });
        assert!(matches!(result, Err(FetchError::Parse(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn huge_retry_counts_do_not_overflow() {
        let p = RetryPolicy::new(64, Duration::from_secs(1));
        assert!(p.delay_for(63) > Duration::ZERO);
        let _ = p.total_backoff();
    }
}
