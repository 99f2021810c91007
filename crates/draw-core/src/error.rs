//! Error types for the draw-relay system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for draw-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the draw-relay system
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing caller input (user-visible, rejected before any mutation)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Poll source unreachable, non-JSON, or without usable data
    #[error("Upstream fetch error: {0}")]
    UpstreamFetch(String),

    /// Remote mirror unreachable or rejected the write
    #[error("Mirror error: {0}")]
    Mirror(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors (mirror credentials rejected)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Unexpected failure while handling a request
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an upstream fetch error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamFetch(msg.into())
    }

    /// Create a mirror error
    pub fn mirror(msg: impl Into<String>) -> Self {
        Self::Mirror(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error was caused by the caller's input
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
