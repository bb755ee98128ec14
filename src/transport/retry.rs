//! # Connection Retry Protocol
//!
//! Bounded-attempt loop with exponential backoff around a single session
//! attempt. Attempt numbers start at 1; the delay after attempt `n` is
//! `backoff_base * 2^(n-1)`, so the first retry waits exactly the base.
//! Fatal errors (authentication) end the loop immediately; exhausting the
//! attempt budget yields `SessionError::RetriesExhausted` carrying the last
//! failure.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use super::{SessionError, SessionOutput};

/// Attempt budget and backoff base for one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first try; must be at least 1
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each further retry
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Backoff to sleep after a failed attempt `n` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::constants::DEFAULT_MAX_RETRY_ATTEMPTS,
            Duration::from_millis(crate::constants::DEFAULT_RETRY_BACKOFF_MS),
        )
    }
}

/// Run `attempt_fn` up to the policy's attempt budget.
///
/// Retryable failures sleep the backoff and try again; non-retryable
/// failures return immediately with exactly the attempts made so far.
pub async fn run_with_retry<F, Fut>(
    policy: &RetryPolicy,
    mut attempt_fn: F,
) -> Result<SessionOutput, SessionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<SessionOutput, SessionError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match attempt_fn(attempt).await {
            Ok(output) => return Ok(output),
            Err(error) if !error.is_retryable() => {
                warn!(attempt, error = %error, "session attempt failed fatally, not retrying");
                return Err(error);
            }
            Err(error) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "session attempt failed"
                );
                if attempt >= policy.max_attempts {
                    return Err(SessionError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
                let delay = policy.delay_for(attempt);
                info!(delay_ms = delay.as_millis() as u64, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
