//! HTTP transport seam.
//!
//! The rest of the client treats the remote call as a function from
//! (method, path, query, body) to (status, headers, json-or-empty): the
//! [`Transport`] trait. [`HttpTransport`] is the [`reqwest`]
//! implementation; tests substitute a scripted mock.
//!
//! A transport returns `Ok` for *every* HTTP response regardless of
//! status, so that rate-limit headers on failures still reach the tracker.
//! Status classification happens afterwards via
//! [`RawResponse::error_for_status`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ApiError;

/// Upper bound on every remote call. Exceeding it is a retryable failure,
/// not a fatal one.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// API-key header the ShipsGo API expects.
const API_KEY_HEADER: &str = "x-shipsgo-user-token";

/// An HTTP response reduced to what the client consumes.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Response headers with lower-cased names.
    pub headers: HashMap<String, String>,
    /// Parsed JSON body, `None` for empty or non-JSON bodies.
    pub body: Option<Value>,
}

impl RawResponse {
    /// Convert a non-success status into the matching [`ApiError`].
    ///
    /// 402 becomes [`ApiError::InsufficientCredits`], 429 becomes
    /// [`ApiError::RateLimited`] (honoring `Retry-After`), every other
    /// non-2xx becomes [`ApiError::Api`]. 2xx responses pass through.
    pub fn error_for_status(self) -> Result<RawResponse, ApiError> {
        match self.status {
            200..=299 => Ok(self),
            402 => Err(ApiError::InsufficientCredits {
                body: self.body_text(),
            }),
            429 => Err(ApiError::RateLimited {
                retry_after: self.retry_after(),
            }),
            status => Err(ApiError::Api {
                status,
                body: self.body_text(),
            }),
        }
    }

    /// Server-requested wait from the `Retry-After` header, seconds form
    /// only. HTTP-date forms are ignored and fall back to computed backoff.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    fn body_text(&self) -> String {
        self.body
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default()
    }
}

/// The single seam between the client and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one HTTP request.
    ///
    /// `Err` is reserved for transport-level failures (timeout, DNS,
    /// connection reset); an HTTP response of any status is `Ok`.
    async fn send(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<RawResponse, ApiError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<RawResponse, ApiError> {
        (**self).send(method, path, query, body).await
    }
}

/// Production transport backed by a pooled [`reqwest::Client`].
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    /// Build a transport for the configured API endpoint.
    ///
    /// The underlying client enforces [`REQUEST_TIMEOUT`] on every call.
    pub fn new(config: &ClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<RawResponse, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| ApiError::Config(format!("invalid HTTP method: {method}")))?;

        let mut request = self
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, &self.api_key);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout {
                    elapsed: started.elapsed(),
                }
            } else {
                ApiError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout {
                    elapsed: started.elapsed(),
                }
            } else {
                ApiError::Transport(e.to_string())
            }
        })?;
        let body = serde_json::from_str::<Value>(&text).ok();

        tracing::debug!(status, url = %url, "API response received");

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn response(status: u16, headers: &[(&str, &str)], body: Option<Value>) -> RawResponse {
        RawResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body,
        }
    }

    #[test]
    fn success_statuses_pass_through() {
        for status in [200, 201, 204] {
            assert!(response(status, &[], None).error_for_status().is_ok());
        }
    }

    #[test]
    fn payment_required_maps_to_insufficient_credits() {
        let raw = response(402, &[], Some(json!({"message": "no credits"})));
        assert_matches!(
            raw.error_for_status(),
            Err(ApiError::InsufficientCredits { body }) if body.contains("no credits")
        );
    }

    #[test]
    fn too_many_requests_carries_retry_after() {
        let raw = response(429, &[("retry-after", "12")], None);
        assert_matches!(
            raw.error_for_status(),
            Err(ApiError::RateLimited { retry_after: Some(d) }) if d == Duration::from_secs(12)
        );
    }

    #[test]
    fn unparsable_retry_after_is_ignored() {
        let raw = response(429, &[("retry-after", "Wed, 21 Oct 2026 07:28:00 GMT")], None);
        assert_matches!(
            raw.error_for_status(),
            Err(ApiError::RateLimited { retry_after: None })
        );
    }

    #[test]
    fn other_failures_keep_status_and_body() {
        let raw = response(409, &[], Some(json!({"message": "duplicate"})));
        assert_matches!(
            raw.error_for_status(),
            Err(ApiError::Api { status: 409, body }) if body.contains("duplicate")
        );
    }
}
