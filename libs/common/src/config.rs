//! Client configuration loaded from the environment

use std::env;
use std::time::Duration;

use crate::error::{InterpalsError, InterpalsResult};

/// Default site address
pub const DEFAULT_BASE_URL: &str = "https://www.interpals.net";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Default `User-Agent` header sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/70.0.3538.77 Safari/537.36";

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Site base URL, without a trailing slash
    pub base_url: String,
    /// Timeout applied to every single request
    pub timeout: Duration,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new ClientConfig from environment variables
    ///
    /// # Environment Variables
    /// - `INTERPALS_BASE_URL`: site address (default: "https://www.interpals.net")
    /// - `INTERPALS_TIMEOUT_SECS`: per-request timeout in seconds (default: 3)
    /// - `INTERPALS_USER_AGENT`: `User-Agent` header (default: desktop Chrome)
    pub fn from_env() -> InterpalsResult<Self> {
        let base_url = env::var("INTERPALS_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(InterpalsError::Configuration(format!(
                "INTERPALS_BASE_URL must be an http(s) URL, got {base_url:?}"
            )));
        }

        let timeout_secs = parse_var("INTERPALS_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        let user_agent =
            env::var("INTERPALS_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            user_agent,
        })
    }

    /// Configuration pointing at another base URL, other values default
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

/// Read a numeric variable, falling back to `default` when unset
pub(crate) fn parse_var(name: &str, default: u64) -> InterpalsResult<u64> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| {
            InterpalsError::Configuration(format!("{name} must be a number, got {value:?}"))
        }),
        Err(_) => Ok(default),
    }
}
