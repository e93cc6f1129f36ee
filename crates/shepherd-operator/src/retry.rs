//! Bounded retry with an injectable sleep
//!
//! The operator's provider-facing retries are all bounded policies: a fixed
//! number of attempts with a fixed or linearly growing delay. Keeping the
//! delay behind the [`Sleep`] trait lets tests run the full attempt count
//! without wall-clock time.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Sleep abstraction so retry loops are testable without real delays.
pub trait Sleep: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How the delay between attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// No delay between attempts
    None,
    /// Same delay before every retry
    Fixed(Duration),
    /// Delay grows linearly with the attempt index: `base * attempt`
    Linear(Duration),
}

/// A bounded retry policy: at most `max_attempts` tries, delayed per
/// `backoff` between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Policy for assume-role calls: freshly created roles and policies can
    /// take tens of seconds to propagate.
    pub const fn assume_role() -> Self {
        Self::new(
            shepherd_common::defaults::ASSUME_ROLE_MAX_ATTEMPTS,
            Backoff::Fixed(Duration::from_millis(
                shepherd_common::defaults::ASSUME_ROLE_DELAY_MS,
            )),
        )
    }

    /// Policy for re-checking the assumed-role ID after role replacement.
    pub const fn role_id_match() -> Self {
        Self::new(
            shepherd_common::defaults::ROLE_ID_MATCH_MAX_ATTEMPTS,
            Backoff::Linear(Duration::from_secs(1)),
        )
    }

    /// Delay to apply after the given zero-based attempt, or `None` when the
    /// policy is exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        Some(match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => d,
            Backoff::Linear(base) => base * (attempt + 1),
        })
    }

    /// Run `op` until it succeeds or the policy is exhausted, returning the
    /// last error in that case.
    pub async fn run<T, E, F, Fut, S>(&self, sleeper: &S, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        S: Sleep,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => match self.delay_after(attempt) {
                    Some(delay) => {
                        debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                        if !delay.is_zero() {
                            sleeper.sleep(delay).await;
                        }
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }
}
