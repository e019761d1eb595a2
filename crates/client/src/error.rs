//! Error taxonomy for the tracking client.
//!
//! Transport failures and application-level status codes are folded into a
//! single [`ApiError`] enum, and a single [`classify`] function maps every
//! error onto a [`RetryClass`] consumed by the backoff loop. Callers never
//! inspect raw status codes to decide whether to retry.

use std::time::Duration;

/// Errors surfaced by the tracking client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The API returned a non-2xx status that is neither 402 nor 429.
    /// Surfaced verbatim with the response body; never retried (5xx is
    /// retried by the backoff loop before it reaches the caller).
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// HTTP 429. Retried transparently; reaches the caller only after the
    /// retry budget is exhausted.
    #[error("rate limited by the API")]
    RateLimited {
        /// Server-provided wait hint, when a `Retry-After` header was sent.
        retry_after: Option<Duration>,
    },

    /// HTTP 402. The account has no credits left for metered creates.
    /// Never retried.
    #[error("insufficient API credits: {body}")]
    InsufficientCredits { body: String },

    /// The remote call exceeded the request timeout. Retryable.
    #[error("request timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Network-level failure (DNS, connection reset, TLS). Retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// Client misconfiguration or an API integrity violation (e.g. a 409
    /// conflict for a shipment the API then cannot find).
    #[error("configuration error: {0}")]
    Config(String),

    /// The response body could not be interpreted. Retrying won't fix it.
    #[error("malformed API response: {0}")]
    Decode(String),
}

/// Convenience alias for client results.
pub type ApiResult<T> = Result<T, ApiError>;

/// Tagged retry outcome for a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Do not retry; surface immediately.
    Fatal,
    /// Retry with computed exponential backoff.
    Retryable,
    /// Retry, preferring the server-provided delay when present.
    RateLimited(Option<Duration>),
    /// Do not retry; credits will not reappear on their own.
    InsufficientCredits,
}

/// Classify an error for the backoff loop.
///
/// 5xx, timeouts, and network failures are transient; any other 4xx than
/// 429/402 is fatal. The status-code arms cover transports that report
/// plain status errors without pre-classifying them.
pub fn classify(err: &ApiError) -> RetryClass {
    match err {
        ApiError::Api { status, .. } => match status {
            429 => RetryClass::RateLimited(None),
            402 => RetryClass::InsufficientCredits,
            400..=499 => RetryClass::Fatal,
            500..=599 => RetryClass::Retryable,
            _ => RetryClass::Fatal,
        },
        ApiError::RateLimited { retry_after } => RetryClass::RateLimited(*retry_after),
        ApiError::InsufficientCredits { .. } => RetryClass::InsufficientCredits,
        ApiError::Timeout { .. } | ApiError::Transport(_) => RetryClass::Retryable,
        ApiError::Config(_) | ApiError::Decode(_) => RetryClass::Fatal,
    }
}
