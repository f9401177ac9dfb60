//! Error types shared by the Interpals client crates
//!
//! Every public operation of the client returns [`InterpalsResult`]. Errors are
//! surfaced unmodified: nothing in the client retries or falls back silently.

use thiserror::Error;

/// Boxed error produced by a transport implementation
pub type TransportSource = Box<dyn std::error::Error + Send + Sync>;

/// Error taxonomy of the Interpals client
#[derive(Error, Debug)]
pub enum InterpalsError {
    /// Login was refused: bad credentials, throttling, or no session token issued
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The session was logged out locally or invalidated by the server
    #[error("Session expired")]
    SessionExpired,

    /// The network call itself failed
    #[error("Transport error: {0}")]
    Transport(#[source] TransportSource),

    /// A mandatory field could not be located in a site payload
    #[error("Parse error: could not locate {field}")]
    Parse {
        /// Name of the missing field
        field: &'static str,
        /// The payload fragment that was being decoded
        fragment: String,
    },

    /// The referenced username, uid, album or thread does not exist or is inaccessible
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller input was rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// The site answered with an explicit error or an unexpected status
    #[error("Site error: {0}")]
    Site(String),

    /// Session store (Redis) failure
    #[error("Session store error: {0}")]
    Store(#[from] redis::RedisError),

    /// Session snapshot (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl InterpalsError {
    /// Wrap a transport-level failure
    pub fn transport<E>(error: E) -> Self
    where
        E: Into<TransportSource>,
    {
        InterpalsError::Transport(error.into())
    }

    /// Build a parse error for `field`, keeping the offending fragment
    pub fn parse(field: &'static str, fragment: impl Into<String>) -> Self {
        InterpalsError::Parse {
            field,
            fragment: fragment.into(),
        }
    }
}

/// Type alias for Result with InterpalsError
pub type InterpalsResult<T> = Result<T, InterpalsError>;
