//! Async retry utilities with exponential backoff

use std::time::Duration;

/// Default maximum attempts for one API request (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay in milliseconds for exponential backoff
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Upper bound on a single backoff sleep
pub const MAX_DELAY_MS: u64 = 30_000;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), capped at [`MAX_DELAY_MS`]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(MAX_DELAY_MS))
    }
}

/// Retry an async operation with exponential backoff while `should_retry`
/// accepts the error.
///
/// Returns `Ok(value)` on success, or `Err((error, attempts))` once the error
/// is not retryable or attempts are exhausted.
pub async fn retry_with_backoff_async<F, Fut, T, E, P>(
    policy: RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T, (E, u32)>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempts >= max_attempts || !should_retry(&e) {
                    return Err((e, attempts));
                }
                let delay = policy.delay_for(attempts);
                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
