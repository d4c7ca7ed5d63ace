//! Retry policy and the clock every waiting component sleeps on.
//!
//! ## Clock
//!
//! Every wait in the pipeline (import polls, the settle delay, image backoff,
//! pacing between images) goes through [`Clock::sleep`], and deadlines are
//! measured with [`Clock::now`]. Tests substitute a clock that records the
//! requested durations and advances a virtual `now`.
//!
//! ## Backoff
//!
//! `attempt` is 1-based. [`Backoff::Linear`] waits `attempt × step` after the
//! `attempt`-th failure, so with a 2 s step the sequence is 2 s → 4 s → 6 s.

use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

/// Source of time and delays for the pipeline.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspend the calling task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Delay between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failure.
    Fixed(Duration),
    /// `attempt × step` after the `attempt`-th failure.
    Linear(Duration),
}

impl Backoff {
    /// Delay to wait after the 1-based `attempt` failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(d) => d,
            Backoff::Linear(step) => step.saturating_mul(attempt.max(1)),
        }
    }
}

/// Bounded retry policy: how many attempts and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Always ≥ 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Image upload/patch default: 3 attempts, `attempt × 2 s`.
    pub fn image_default() -> Self {
        Self::new(3, Backoff::Linear(Duration::from_secs(2)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::image_default()
    }
}

/// The last error after every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// `op` receives the 1-based attempt number. No delay follows the final
/// failed attempt.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    label: &str,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max => {
                warn!("{label}: attempt {attempt}/{max} failed — {e}; giving up");
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = policy.backoff.delay_after(attempt);
                warn!(
                    "{label}: attempt {attempt}/{max} failed — {e}; retrying in {}ms",
                    delay.as_millis()
                );
                clock.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
