//! Client configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ApiError;
use crate::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.shipsgo.com/v2";

/// Default side file for the persisted rate-limit record.
pub const DEFAULT_RATE_LIMIT_PATH: &str = ".shipsgo-rate-limit.json";

/// Configuration for the tracking client.
///
/// The API key is mandatory; everything else has a sensible default.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// ShipsGo user token, sent on every request.
    pub api_key: String,
    /// API base URL (default: [`DEFAULT_BASE_URL`]).
    pub base_url: String,
    /// Where the rate-limit record is persisted.
    pub rate_limit_path: PathBuf,
    /// Retry budget per logical remote call.
    pub max_retries: u32,
    /// Base delay for the exponential backoff schedule.
    pub base_delay: Duration,
}

impl ClientConfig {
    /// Build a configuration with defaults for everything but the key.
    ///
    /// An empty API key is a construction-time error, not a deferred
    /// request failure.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ApiError::Config("API key must not be empty".into()));
        }
        Ok(Self {
            api_key,
            base_url: base_url.into(),
            rate_limit_path: PathBuf::from(DEFAULT_RATE_LIMIT_PATH),
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var                   | Default                          |
    /// |---------------------------|----------------------------------|
    /// | `SHIPSGO_API_KEY`         | — (required)                     |
    /// | `SHIPSGO_API_URL`         | `https://api.shipsgo.com/v2`     |
    /// | `SHIPSGO_RATE_LIMIT_PATH` | `.shipsgo-rate-limit.json`       |
    pub fn from_env() -> Result<Self, ApiError> {
        let api_key = std::env::var("SHIPSGO_API_KEY")
            .map_err(|_| ApiError::Config("SHIPSGO_API_KEY is not set".into()))?;
        let base_url =
            std::env::var("SHIPSGO_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        let mut config = Self::new(api_key, base_url)?;
        if let Ok(path) = std::env::var("SHIPSGO_RATE_LIMIT_PATH") {
            config.rate_limit_path = PathBuf::from(path);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_api_key_is_rejected_at_construction() {
        assert_matches!(
            ClientConfig::new("", DEFAULT_BASE_URL),
            Err(ApiError::Config(_))
        );
        assert_matches!(
            ClientConfig::new("   ", DEFAULT_BASE_URL),
            Err(ApiError::Config(_))
        );
    }

    #[test]
    fn new_applies_defaults() {
        let config = ClientConfig::new("token", DEFAULT_BASE_URL).unwrap();
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.base_delay, DEFAULT_BASE_DELAY);
        assert_eq!(
            config.rate_limit_path,
            PathBuf::from(DEFAULT_RATE_LIMIT_PATH)
        );
    }
}
