//! Error types for oidc-login
//!
//! This module defines the error types used throughout the crate, using
//! `thiserror` for ergonomic error handling.
//!
//! Two layers exist:
//!
//! - [`OidcLoginError`] covers setup and I/O failures (configuration, session
//!   files, client construction).  These surface through the crate-wide
//!   [`Result`] alias and are fatal for the request that hit them.
//! - [`RefreshError`] is the refresh-time taxonomy.  The token manager
//!   contains every variant and converts it to a boolean outcome; the kind is
//!   kept for logging and tests.

use thiserror::Error;

/// Main error type for oidc-login operations
///
/// This enum encompasses the failures that can occur while loading
/// configuration, reading or writing session storage, and constructing a
/// protocol client.
#[derive(Error, Debug)]
pub enum OidcLoginError {
    /// Configuration-related errors (missing or malformed settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session storage errors
    #[error("Session error: {0}")]
    Session(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for oidc-login operations
///
/// Uses `anyhow::Error` as the error type so setup paths can attach context
/// while propagating with `?`.
pub type Result<T> = anyhow::Result<T>;

/// Failure kinds of a single refresh cycle.
///
/// None of these escape [`TokenManager::refresh_tokens`]; they are mapped to
/// `false` there.  [`TokenManager::try_refresh`] exposes them directly.
///
/// [`TokenManager::refresh_tokens`]: crate::auth::manager::TokenManager::refresh_tokens
/// [`TokenManager::try_refresh`]: crate::auth::manager::TokenManager::try_refresh
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The session holds no usable refresh token.
    #[error("no refresh token in session")]
    MissingRefreshToken,

    /// Transport or protocol failure while talking to the identity provider.
    #[error("provider communication failed: {0}")]
    ProviderCommunication(String),

    /// The provider did not answer within the configured refresh timeout.
    #[error("provider did not respond within {0}s")]
    Timeout(u64),

    /// The provider response was malformed or failed validation.
    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),
}

impl RefreshError {
    /// Short machine-friendly label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            RefreshError::MissingRefreshToken => "missing_refresh_token",
            RefreshError::ProviderCommunication(_) => "provider_communication",
            RefreshError::Timeout(_) => "timeout",
            RefreshError::InvalidTokenResponse(_) => "invalid_token_response",
        }
    }
}
