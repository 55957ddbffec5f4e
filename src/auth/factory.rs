//! Protocol client construction
//!
//! The token manager asks a [`ClientFactory`] for a fresh client on every
//! refresh.  [`OidcClientFactory`] reads provider settings from a
//! [`SystemConfig`] accessor and maps them onto an immutable
//! [`ClientConfig`].  Construction performs no I/O; a malformed setting is a
//! configuration error that the manager does not contain.

use std::sync::Arc;

use url::Url;

use crate::auth::client::{ClientConfig, OidcClient, ProtocolClient, ProviderSettings};
use crate::config::{keys, SystemConfig, DEFAULT_SCOPE};
use crate::error::{OidcLoginError, Result};

/// Builds protocol clients bound to a callback URL.
pub trait ClientFactory: Send + Sync {
    /// Creates a client whose redirect URL is `callback_url`.
    ///
    /// # Errors
    ///
    /// Returns [`OidcLoginError::Config`] when the provider settings or the
    /// callback URL are malformed.
    fn create_client(&self, callback_url: &str) -> Result<Arc<dyn ProtocolClient>>;
}

/// Factory for [`OidcClient`] instances.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use oidc_login::auth::factory::OidcClientFactory;
/// use oidc_login::config::{Config, OidcConfig};
///
/// let config = Config {
///     oidc: OidcConfig {
///         provider_url: "https://idp.example.com".to_string(),
///         client_id: "cloud".to_string(),
///         ..OidcConfig::default()
///     },
///     ..Config::default()
/// };
/// let factory = OidcClientFactory::new(Arc::new(config));
/// let client_config = factory
///     .client_config("https://cloud.example.com/apps/oidc_login/oidc")
///     .unwrap();
/// assert!(client_config.verify_host && client_config.verify_peer);
/// assert_eq!(client_config.scopes, vec!["openid".to_string()]);
/// ```
#[derive(Clone)]
pub struct OidcClientFactory {
    config: Arc<dyn SystemConfig>,
}

impl OidcClientFactory {
    /// Creates a factory reading settings from `config`.
    pub fn new(config: Arc<dyn SystemConfig>) -> Self {
        Self { config }
    }

    /// Maps configuration onto a [`ClientConfig`] for `callback_url`.
    ///
    /// TLS verification defaults to enabled and the scope to `openid`.
    ///
    /// # Errors
    ///
    /// Returns [`OidcLoginError::Config`] if `callback_url` is not absolute.
    pub fn client_config(&self, callback_url: &str) -> Result<ClientConfig> {
        let redirect = Url::parse(callback_url).map_err(|e| {
            OidcLoginError::Config(format!("callback URL {callback_url:?} is invalid: {e}"))
        })?;

        let tls_verify = self.config.get_bool(keys::TLS_VERIFY, true);

        let scope = self.config.get_string(keys::SCOPE, DEFAULT_SCOPE);
        let mut scopes: Vec<String> = Vec::new();
        for s in scope.split_whitespace() {
            if !scopes.iter().any(|existing| existing == s) {
                scopes.push(s.to_string());
            }
        }

        Ok(ClientConfig {
            redirect_url: redirect.to_string(),
            verify_host: tls_verify,
            verify_peer: tls_verify,
            scopes,
        })
    }

    /// Reads provider identity and endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`OidcLoginError::Config`] if the provider URL or client id is
    /// missing, or any configured endpoint is not a valid URL.
    pub fn provider_settings(&self) -> Result<ProviderSettings> {
        let issuer = self
            .config
            .get_optional(keys::PROVIDER_URL)
            .ok_or_else(|| OidcLoginError::Config("provider URL is not configured".to_string()))?;
        let issuer = parse_setting(keys::PROVIDER_URL, &issuer)?;

        let client_id = self
            .config
            .get_optional(keys::CLIENT_ID)
            .ok_or_else(|| OidcLoginError::Config("client id is not configured".to_string()))?;

        let token_endpoint = self
            .config
            .get_optional(keys::TOKEN_ENDPOINT)
            .map(|raw| parse_setting(keys::TOKEN_ENDPOINT, &raw))
            .transpose()?;
        let end_session_endpoint = self
            .config
            .get_optional(keys::END_SESSION_ENDPOINT)
            .map(|raw| parse_setting(keys::END_SESSION_ENDPOINT, &raw))
            .transpose()?;

        Ok(ProviderSettings {
            issuer,
            client_id,
            client_secret: self.config.get_optional(keys::CLIENT_SECRET),
            token_endpoint,
            end_session_endpoint,
            post_logout_redirect_uri: self.config.get_optional(keys::POST_LOGOUT_REDIRECT_URI),
        })
    }

    /// Builds the concrete client.
    ///
    /// # Errors
    ///
    /// See [`client_config`](Self::client_config) and
    /// [`provider_settings`](Self::provider_settings).
    pub fn build(&self, callback_url: &str) -> Result<OidcClient> {
        let client_config = self.client_config(callback_url)?;
        let provider = self.provider_settings()?;
        OidcClient::new(provider, client_config)
    }
}

impl ClientFactory for OidcClientFactory {
    fn create_client(&self, callback_url: &str) -> Result<Arc<dyn ProtocolClient>> {
        Ok(Arc::new(self.build(callback_url)?))
    }
}

fn parse_setting(key: &str, raw: &str) -> Result<Url> {
    let url =
        Url::parse(raw).map_err(|e| OidcLoginError::Config(format!("{key} is invalid: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(OidcLoginError::Config(format!("{key} must be an http(s) URL")).into());
    }
    Ok(url)
}
