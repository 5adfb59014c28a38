//! Bounded retry harnesses shared by all pipeline stages
//!
//! Two shapes are used throughout the pipeline:
//!
//! * [`RetryPolicy`] wraps a worker thunk returning an [`Attempt`]. The
//!   thunk classifies its own errors; `Done` covers both success and
//!   non-retryable skips.
//! * [`retry_op`] wraps a `Result`-returning thunk with a fixed attempt
//!   count and fixed inter-attempt sleep; stages use it around every
//!   catalog call.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::constants::limits;

/// Outcome of one attempt of a retried unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The unit is finished: it succeeded or was skipped for a
    /// non-retryable reason.
    Done,
    /// The unit failed transiently and should be attempted again.
    Retry,
}

/// Bounded retry loop with jittered fixed backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Run `op` at most `1 + max_retries` times, sleeping
    /// `backoff + U[0, backoff / 10)` between attempts. The harness does
    /// no error classification of its own.
    pub async fn run<F, Fut>(&self, mut op: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt>,
    {
        let mut retries = 0;
        loop {
            if op().await == Attempt::Done {
                return;
            }
            if retries >= self.max_retries {
                return;
            }
            retries += 1;
            tokio::time::sleep(self.next_backoff()).await;
        }
    }

    fn next_backoff(&self) -> Duration {
        let cap = self.backoff.as_millis() as u64 / limits::BACKOFF_JITTER_DIVISOR;
        let jitter = if cap == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..cap)
        };
        self.backoff + Duration::from_millis(jitter)
    }
}

/// Run a fallible operation up to `attempts` times with a fixed sleep
/// between attempts, returning the first success or the last error.
pub async fn retry_op<T, E, F, Fut>(attempts: u32, interval: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    debug_assert!(attempts > 0);
    let mut tried = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                tried += 1;
                if tried >= attempts {
                    return Err(error);
                }
                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// The fixed 3-try, 1-second harness used around catalog operations.
pub async fn retry_catalog_op<T, E, F, Fut>(op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_op(
        limits::CATALOG_RETRY_ATTEMPTS,
        limits::CATALOG_RETRY_INTERVAL,
        op,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn zero_max_retries_means_one_attempt() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(0, Duration::ZERO);
        policy
            .run(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Attempt::Retry
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_after_done() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO);
        policy
            .run(|| async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Attempt::Retry
                } else {
                    Attempt::Done
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_retry_budget() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        policy
            .run(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Attempt::Retry
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn retry_op_returns_first_success() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, &str> = retry_op(3, Duration::ZERO, || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 { Err("transient") } else { Ok(n) }
        })
        .await;
        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_op_surfaces_last_error() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), u32> = retry_op(3, Duration::ZERO, || async move {
            Err(calls.fetch_add(1, Ordering::SeqCst))
        })
        .await;
        assert_eq!(result, Err(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_stays_within_jitter_window() {
        let policy = RetryPolicy::new(1, Duration::from_millis(1000));
        for _ in 0..50 {
            let backoff = policy.next_backoff();
            assert!(backoff >= Duration::from_millis(1000));
            assert!(backoff < Duration::from_millis(1100));
        }
    }
}
