//! Bounded retry with exponential backoff and full jitter.
//!
//! Used for every remote call the pipeline makes: reading an original back
//! from blob storage, uploading each rendition, and reverse geocoding. The
//! wrapper never returns `Err`; it hands back a [`RetryOutcome`] so the caller
//! decides whether exhaustion is fatal.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt budget and delay caps for one class of remote call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,

    /// Delay scale in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound on any single delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

/// Result of a retried operation, with the number of attempts made.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success { value: T, attempts: u32 },
    Failure { error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. } | RetryOutcome::Failure { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success { .. })
    }

    /// Drop the attempt count on success, keep it on failure.
    pub fn into_result(self) -> Result<T, (E, u32)> {
        match self {
            RetryOutcome::Success { value, .. } => Ok(value),
            RetryOutcome::Failure { error, attempts } => Err((error, attempts)),
        }
    }
}

/// Upper bound of the jitter window before attempt `attempt` (0-indexed).
///
/// `min(max_delay_ms, base_delay_ms * 2^attempt)`
pub fn backoff_ceiling(policy: &RetryPolicy, attempt: u32) -> u64 {
    policy
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(policy.max_delay_ms)
}

/// Full-jitter delay: uniform in `[0, backoff_ceiling]`.
pub fn jittered_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let ceiling = backoff_ceiling(policy, attempt);
    if ceiling == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// `op` receives the 0-indexed attempt number.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, op: F) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    with_retry_when(policy, op, |_| true).await
}

/// Like [`with_retry`], but stops at the first error `should_retry` rejects.
pub async fn with_retry_when<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    should_retry: P,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        if attempt > 0 {
            let delay = jittered_delay(policy, attempt);
            tracing::trace!(attempt, delay_ms = delay.as_millis() as u64, "Backing off");
            tokio::time::sleep(delay).await;
        }

        match op(attempt).await {
            Ok(value) => {
                return RetryOutcome::Success {
                    value,
                    attempts: attempt + 1,
                }
            }
            Err(error) => {
                let attempts = attempt + 1;
                if attempts >= max_attempts {
                    return RetryOutcome::Failure { error, attempts };
                }
                if !should_retry(&error) {
                    tracing::debug!(attempts, error = %error, "Permanent failure, not retrying");
                    return RetryOutcome::Failure { error, attempts };
                }
                tracing::debug!(
                    attempt = attempts,
                    max_attempts,
                    error = %error,
                    "Transient failure, retrying"
                );
                attempt += 1;
            }
        }
    }
}
