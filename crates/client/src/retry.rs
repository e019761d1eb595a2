//! Retry with exponential backoff and jitter.
//!
//! [`with_retry`] wraps one logical remote call. Failures are classified
//! through [`classify`]: transient ones (5xx, 429, network, timeout) are
//! retried with growing delays, fatal ones are returned immediately. When
//! a 429 carries an explicit `Retry-After`, that duration overrides the
//! computed delay. There is no circuit breaker; callers invoke this
//! wrapper per call.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{classify, ApiError, RetryClass};

/// Additional attempts after the first, by default.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for the exponential schedule.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Upper bound on the random jitter added to each computed delay.
const MAX_JITTER_MS: u64 = 500;

/// Run `operation` with the default retry budget.
pub async fn with_retry<T, F, Fut>(operation: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    with_retry_config(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY, operation).await
}

/// Run `operation`, retrying transient failures up to `max_retries` times.
///
/// Delay before retry `n` (zero-based) is `base_delay * 2^n` plus up to
/// 500 ms of jitter, unless the failure carries a server-provided
/// retry-after duration, which wins. After exhausting the budget the last
/// error is returned.
pub async fn with_retry_config<T, F, Fut>(
    max_retries: u32,
    base_delay: Duration,
    mut operation: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let server_hint = match classify(&err) {
                    RetryClass::Fatal | RetryClass::InsufficientCredits => return Err(err),
                    RetryClass::Retryable => None,
                    RetryClass::RateLimited(hint) => hint,
                };
                if attempt >= max_retries {
                    return Err(err);
                }

                let delay = server_hint.unwrap_or_else(|| backoff_delay(base_delay, attempt));
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient API failure, retrying",
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Exponential delay with jitter for a zero-based attempt index.
fn backoff_delay(base_delay: Duration, attempt: u32) -> Duration {
    let exponential = (base_delay.as_millis() as u64).saturating_mul(1u64 << attempt.min(16));
    let jitter = rand::rng().random_range(0..MAX_JITTER_MS);
    Duration::from_millis(exponential.saturating_add(jitter))
}
