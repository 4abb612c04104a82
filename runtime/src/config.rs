//! Transport configuration.
//!
//! # Example
//!
//! ```
//! use formwire_runtime::config::TransportConfig;
//! use std::time::Duration;
//!
//! let config = TransportConfig::default()
//!     .with_base_url("https://api.example.com")
//!     .with_timeout(Duration::from_secs(5))
//!     .with_default_header("X-Client", "web");
//!
//! assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
//! ```

use formwire_core::request::Headers;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the base URL
pub const ENV_BASE_URL: &str = "FORMWIRE_BASE_URL";
/// Environment variable holding the bearer token
pub const ENV_API_TOKEN: &str = "FORMWIRE_API_TOKEN";
/// Environment variable holding the timeout in whole seconds
pub const ENV_TIMEOUT_SECS: &str = "FORMWIRE_TIMEOUT_SECS";
/// Environment variable holding the response size limit in bytes
pub const ENV_MAX_RESPONSE_BYTES: &str = "FORMWIRE_MAX_RESPONSE_BYTES";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default response size limit (10 MiB)
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Errors from reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value that does not parse
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// The HTTP client could not be built from the configuration
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Settings for [`HttpTransport`](crate::http::HttpTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Prefix for relative request URLs
    pub base_url: Option<String>,
    /// Per-request timeout; an expired request counts as a connectivity failure
    pub timeout: Duration,
    /// Headers added to every request unless the request sets them
    pub default_headers: Headers,
    /// Token sent as `authorization: Bearer ...` unless the request sets one
    pub bearer_token: Option<String>,
    /// Largest response body accepted
    pub max_response_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            default_headers: Headers::new(),
            bearer_token: None,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl TransportConfig {
    /// Read configuration from the environment
    ///
    /// Missing variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup` instead of the process environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|value| !value.is_empty()) {
            config.base_url = Some(base_url);
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|value| !value.is_empty()) {
            config.bearer_token = Some(token);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = parse_var(ENV_TIMEOUT_SECS, &raw)?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(ENV_MAX_RESPONSE_BYTES) {
            config.max_response_bytes = parse_var(ENV_MAX_RESPONSE_BYTES, &raw)?;
        }

        Ok(config)
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a default header
    #[must_use]
    pub fn with_default_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.default_headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Set the bearer token
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Set the response size limit
    #[must_use]
    pub const fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    /// Resolve a request URL against the base URL.
    ///
    /// Absolute URLs (with a scheme) are returned unchanged.
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if !url.contains("://") => {
                format!(
                    "{}/{}",
                    base.trim_end_matches('/'),
                    url.trim_start_matches('/')
                )
            },
            _ => url.to_owned(),
        }
    }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        var,
        value: raw.to_owned(),
        reason: err.to_string(),
    })
}
