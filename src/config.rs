//! Configuration management for oidc-login
//!
//! This module handles loading, parsing, validating, and exposing
//! configuration from a YAML file and environment variables.
//!
//! Components that need settings do not take [`Config`] directly.  They take
//! a [`SystemConfig`] accessor and read named keys with explicit defaults, the
//! same way a host platform exposes its system configuration.  [`Config`]
//! implements that accessor for the keys listed in [`keys`].

use crate::error::{OidcLoginError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Names of the system configuration keys understood by this crate.
pub mod keys {
    /// Issuer URL of the identity provider.
    pub const PROVIDER_URL: &str = "oidc_login_provider_url";
    /// OAuth client identifier registered at the provider.
    pub const CLIENT_ID: &str = "oidc_login_client_id";
    /// OAuth client secret, when the client is confidential.
    pub const CLIENT_SECRET: &str = "oidc_login_client_secret";
    /// Verify TLS peer certificates and host names.
    pub const TLS_VERIFY: &str = "oidc_login_tls_verify";
    /// Space-separated scope requested from the provider.
    pub const SCOPE: &str = "oidc_login_scope";
    /// Static logout URL that replaces the provider end-session endpoint.
    pub const LOGOUT_URL: &str = "oidc_login_logout_url";
    /// Where the provider sends the browser after logout.
    pub const POST_LOGOUT_REDIRECT_URI: &str = "oidc_login_post_logout_redirect_uri";
    /// Static token endpoint; skips discovery when set.
    pub const TOKEN_ENDPOINT: &str = "oidc_login_token_endpoint";
    /// Static end-session endpoint; skips discovery when set.
    pub const END_SESSION_ENDPOINT: &str = "oidc_login_end_session_endpoint";
    /// Upper bound in seconds for a single provider round-trip.
    pub const REFRESH_TIMEOUT: &str = "oidc_login_refresh_timeout";
    /// Seconds before expiry at which a token is already treated as expired.
    pub const EXPIRY_LEEWAY: &str = "oidc_login_expiry_leeway";
}

/// Default requested scope.
pub const DEFAULT_SCOPE: &str = "openid";

/// Default bound on a provider round-trip, in seconds.
pub const DEFAULT_REFRESH_TIMEOUT_SECONDS: u64 = 10;

// ---------------------------------------------------------------------------
// SystemConfig accessor
// ---------------------------------------------------------------------------

/// Read-only accessor for named system settings.
///
/// Only [`get_system_value`](Self::get_system_value) must be implemented; the
/// typed helpers parse its output and fall back to the supplied default when
/// the key is unset or unparsable.
pub trait SystemConfig: Send + Sync {
    /// Returns the raw value for `key`, or `None` when unset.
    fn get_system_value(&self, key: &str) -> Option<String>;

    /// Returns `key` as a string, or `default` when unset or empty.
    fn get_string(&self, key: &str, default: &str) -> String {
        match self.get_system_value(key) {
            Some(value) if !value.trim().is_empty() => value,
            _ => default.to_string(),
        }
    }

    /// Returns `key` as an optional non-empty string.
    fn get_optional(&self, key: &str) -> Option<String> {
        self.get_system_value(key)
            .filter(|value| !value.trim().is_empty())
    }

    /// Returns `key` as a boolean, or `default` when unset or unparsable.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get_system_value(key) {
            None => default,
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                tracing::warn!(key, value = %raw, "Invalid boolean setting, using default");
                default
            }),
        }
    }

    /// Returns `key` as an unsigned integer, or `default` when unset or
    /// unparsable.
    fn get_u64(&self, key: &str, default: u64) -> u64 {
        match self.get_system_value(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, "Invalid integer setting, using default");
                default
            }),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Main configuration structure for oidc-login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application identity; prefixes route names such as `<app>.login.oidc`.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Absolute base URL of the host application, used to build callback URLs.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Identity provider settings
    #[serde(default)]
    pub oidc: OidcConfig,
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Issuer URL; discovery is fetched from
    /// `<provider_url>/.well-known/openid-configuration`.
    #[serde(default)]
    pub provider_url: String,

    /// OAuth client identifier
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret for confidential clients
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Verify TLS certificates and host names when talking to the provider
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Requested scope (space-separated)
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Static logout URL overriding the provider end-session endpoint
    #[serde(default)]
    pub logout_url: Option<String>,

    /// Redirect target appended to the end-session URL
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,

    /// Static token endpoint; bypasses discovery
    #[serde(default)]
    pub token_endpoint: Option<String>,

    /// Static end-session endpoint; bypasses discovery
    #[serde(default)]
    pub end_session_endpoint: Option<String>,

    /// Upper bound on one provider round-trip (seconds)
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_seconds: u64,

    /// Treat tokens expiring within this many seconds as expired
    #[serde(default)]
    pub expiry_leeway_seconds: u64,
}

fn default_app_name() -> String {
    "oidc_login".to_string()
}

fn default_base_url() -> String {
    "http://localhost".to_string()
}

fn default_true() -> bool {
    true
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_refresh_timeout() -> u64 {
    DEFAULT_REFRESH_TIMEOUT_SECONDS
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            provider_url: String::new(),
            client_id: String::new(),
            client_secret: None,
            tls_verify: true,
            scope: default_scope(),
            logout_url: None,
            post_logout_redirect_uri: None,
            token_endpoint: None,
            end_session_endpoint: None,
            refresh_timeout_seconds: default_refresh_timeout(),
            expiry_leeway_seconds: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            base_url: default_base_url(),
            oidc: OidcConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OidcLoginError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| OidcLoginError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("OIDC_LOGIN_BASE_URL") {
            self.base_url = base_url;
        }

        if let Ok(provider_url) = std::env::var("OIDC_LOGIN_PROVIDER_URL") {
            self.oidc.provider_url = provider_url;
        }

        if let Ok(client_id) = std::env::var("OIDC_LOGIN_CLIENT_ID") {
            self.oidc.client_id = client_id;
        }

        if let Ok(client_secret) = std::env::var("OIDC_LOGIN_CLIENT_SECRET") {
            self.oidc.client_secret = Some(client_secret);
        }

        if let Ok(tls_verify) = std::env::var("OIDC_LOGIN_TLS_VERIFY") {
            match parse_bool(&tls_verify) {
                Some(value) => self.oidc.tls_verify = value,
                None => tracing::warn!("Invalid OIDC_LOGIN_TLS_VERIFY: {}", tls_verify),
            }
        }

        if let Ok(scope) = std::env::var("OIDC_LOGIN_SCOPE") {
            self.oidc.scope = scope;
        }

        if let Ok(logout_url) = std::env::var("OIDC_LOGIN_LOGOUT_URL") {
            self.oidc.logout_url = Some(logout_url);
        }

        if let Ok(timeout) = std::env::var("OIDC_LOGIN_REFRESH_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.oidc.refresh_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid OIDC_LOGIN_REFRESH_TIMEOUT_SECONDS: {}", timeout);
            }
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(OidcLoginError::Config("app_name cannot be empty".to_string()).into());
        }

        require_http_url("base_url", &self.base_url)?;

        if self.oidc.provider_url.trim().is_empty() {
            return Err(
                OidcLoginError::Config("oidc.provider_url cannot be empty".to_string()).into(),
            );
        }
        require_http_url("oidc.provider_url", &self.oidc.provider_url)?;

        if self.oidc.client_id.trim().is_empty() {
            return Err(OidcLoginError::Config("oidc.client_id cannot be empty".to_string()).into());
        }

        if self.oidc.scope.split_whitespace().next().is_none() {
            return Err(OidcLoginError::Config("oidc.scope cannot be empty".to_string()).into());
        }

        for (name, value) in [
            ("oidc.logout_url", &self.oidc.logout_url),
            ("oidc.token_endpoint", &self.oidc.token_endpoint),
            ("oidc.end_session_endpoint", &self.oidc.end_session_endpoint),
        ] {
            if let Some(url) = value {
                require_http_url(name, url)?;
            }
        }

        if self.oidc.refresh_timeout_seconds == 0 {
            return Err(OidcLoginError::Config(
                "oidc.refresh_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.oidc.refresh_timeout_seconds > 300 {
            return Err(OidcLoginError::Config(
                "oidc.refresh_timeout_seconds must be less than or equal to 300".to_string(),
            )
            .into());
        }

        if !self.oidc.tls_verify {
            tracing::warn!("TLS verification towards the identity provider is disabled");
        }

        Ok(())
    }
}

fn require_http_url(name: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| OidcLoginError::Config(format!("{name} is not a valid URL: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(OidcLoginError::Config(format!(
            "{name} must use http or https, got {}",
            url.scheme()
        ))
        .into());
    }
    Ok(())
}

impl SystemConfig for Config {
    fn get_system_value(&self, key: &str) -> Option<String> {
        let oidc = &self.oidc;
        match key {
            keys::PROVIDER_URL => Some(oidc.provider_url.clone()),
            keys::CLIENT_ID => Some(oidc.client_id.clone()),
            keys::CLIENT_SECRET => oidc.client_secret.clone(),
            keys::TLS_VERIFY => Some(oidc.tls_verify.to_string()),
            keys::SCOPE => Some(oidc.scope.clone()),
            keys::LOGOUT_URL => oidc.logout_url.clone(),
            keys::POST_LOGOUT_REDIRECT_URI => oidc.post_logout_redirect_uri.clone(),
            keys::TOKEN_ENDPOINT => oidc.token_endpoint.clone(),
            keys::END_SESSION_ENDPOINT => oidc.end_session_endpoint.clone(),
            keys::REFRESH_TIMEOUT => Some(oidc.refresh_timeout_seconds.to_string()),
            keys::EXPIRY_LEEWAY => Some(oidc.expiry_leeway_seconds.to_string()),
            _ => None,
        }
    }
}
