//! Protocol client for the identity provider
//!
//! [`ProtocolClient`] is the seam between the token manager and the wire:
//! the manager only ever asks for a refresh exchange or an end-session URL.
//! [`OidcClient`] implements it over `reqwest`, resolving endpoints from
//! static configuration or the provider's discovery document.
//!
//! A client is configured once through an immutable [`ClientConfig`] and is
//! not mutated afterwards.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use url::Url;

use crate::auth::discovery::{fetch_provider_metadata, ProviderMetadata};
use crate::auth::token::TokenResponse;
use crate::error::{RefreshError, Result};

// ---------------------------------------------------------------------------
// ProtocolClient
// ---------------------------------------------------------------------------

/// Operations the token manager needs from an identity provider.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Exchanges `refresh_token` for a new, validated token set.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::ProviderCommunication`] on transport or
    /// protocol failure and [`RefreshError::InvalidTokenResponse`] when the
    /// provider answer is malformed.
    async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<TokenResponse, RefreshError>;

    /// Derives the URL that terminates the provider-side session.
    ///
    /// `override_url` replaces the provider's end-session endpoint when set.
    /// `id_token_hint` is appended as a query parameter when available.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::ProviderCommunication`] if no end-session
    /// endpoint can be determined.
    async fn end_session_url(
        &self,
        override_url: Option<&str>,
        id_token_hint: Option<&str>,
    ) -> std::result::Result<String, RefreshError>;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Per-request client configuration, fixed at construction.
///
/// # Examples
///
/// ```
/// use oidc_login::auth::client::ClientConfig;
///
/// let config = ClientConfig {
///     redirect_url: "https://cloud.example.com/apps/oidc_login/oidc".to_string(),
///     verify_host: true,
///     verify_peer: true,
///     scopes: vec!["openid".to_string(), "profile".to_string()],
/// };
/// assert_eq!(config.scope(), "openid profile");
/// assert!(config.verifies_tls());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Absolute callback URL registered with the provider.
    pub redirect_url: String,

    /// Verify that the certificate matches the provider host name.
    pub verify_host: bool,

    /// Verify the provider certificate chain.
    pub verify_peer: bool,

    /// Scopes requested from the provider.
    pub scopes: Vec<String>,
}

impl ClientConfig {
    /// Space-joined scope parameter.
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    /// `true` when both TLS checks are enabled.
    pub fn verifies_tls(&self) -> bool {
        self.verify_host && self.verify_peer
    }
}

/// Provider identity and endpoints.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Issuer URL; discovery root.
    pub issuer: Url,

    /// OAuth client identifier.
    pub client_id: String,

    /// OAuth client secret, sent in the request body when set.
    pub client_secret: Option<String>,

    /// Static token endpoint; discovery is skipped for refresh when set.
    pub token_endpoint: Option<Url>,

    /// Static end-session endpoint; discovery is skipped for logout when set.
    pub end_session_endpoint: Option<Url>,

    /// `post_logout_redirect_uri` appended to end-session URLs.
    pub post_logout_redirect_uri: Option<String>,
}

// ---------------------------------------------------------------------------
// OidcClient
// ---------------------------------------------------------------------------

/// `reqwest`-backed OpenID Connect client.
///
/// Construction performs no I/O.  The discovery document is fetched on first
/// use, only if a needed endpoint is not configured statically, and cached
/// for the lifetime of the client.
pub struct OidcClient {
    http: reqwest::Client,
    provider: ProviderSettings,
    config: ClientConfig,
    metadata: OnceCell<ProviderMetadata>,
}

impl OidcClient {
    /// Builds a client for `provider` with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(provider: ProviderSettings, config: ClientConfig) -> Result<Self> {
        if !config.verifies_tls() {
            tracing::warn!(
                issuer = %provider.issuer,
                verify_host = config.verify_host,
                verify_peer = config.verify_peer,
                "TLS verification disabled for identity provider"
            );
        }

        // rustls cannot skip host name checks on their own, so either flag
        // being off disables certificate validation entirely.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verifies_tls())
            .user_agent(concat!("oidc-login/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            provider,
            config,
            metadata: OnceCell::new(),
        })
    }

    /// Configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Provider this client talks to.
    pub fn provider(&self) -> &ProviderSettings {
        &self.provider
    }

    async fn metadata(&self) -> std::result::Result<&ProviderMetadata, RefreshError> {
        self.metadata
            .get_or_try_init(|| fetch_provider_metadata(&self.http, &self.provider.issuer))
            .await
    }

    async fn token_endpoint(&self) -> std::result::Result<Url, RefreshError> {
        if let Some(endpoint) = &self.provider.token_endpoint {
            return Ok(endpoint.clone());
        }
        let metadata = self.metadata().await?;
        Url::parse(&metadata.token_endpoint).map_err(|e| {
            RefreshError::ProviderCommunication(format!(
                "provider advertised an invalid token_endpoint: {e}"
            ))
        })
    }

    async fn end_session_endpoint(&self) -> std::result::Result<String, RefreshError> {
        if let Some(endpoint) = &self.provider.end_session_endpoint {
            return Ok(endpoint.to_string());
        }
        self.metadata()
            .await?
            .end_session_endpoint
            .clone()
            .ok_or_else(|| {
                RefreshError::ProviderCommunication(
                    "provider does not advertise an end_session_endpoint".to_string(),
                )
            })
    }
}

#[async_trait]
impl ProtocolClient for OidcClient {
    async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<TokenResponse, RefreshError> {
        let endpoint = self.token_endpoint().await?;
        let scope = self.config.scope();

        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.provider.client_id.as_str()),
        ];
        if let Some(secret) = &self.provider.client_secret {
            params.push(("client_secret", secret.as_str()));
        }
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }

        let resp = self
            .http
            .post(endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                RefreshError::ProviderCommunication(format!("refresh token request failed: {e}"))
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            RefreshError::ProviderCommunication(format!("failed to read token response: {e}"))
        })?;

        if !status.is_success() {
            return Err(RefreshError::ProviderCommunication(format!(
                "token endpoint returned {status}: {}",
                oauth_error_summary(&body)
            )));
        }

        TokenResponse::from_json(&body, Some(refresh_token))
    }

    async fn end_session_url(
        &self,
        override_url: Option<&str>,
        id_token_hint: Option<&str>,
    ) -> std::result::Result<String, RefreshError> {
        let endpoint = match override_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => url.to_string(),
            None => self.end_session_endpoint().await?,
        };

        let mut url = Url::parse(&endpoint).map_err(|e| {
            RefreshError::ProviderCommunication(format!("invalid end-session URL {endpoint}: {e}"))
        })?;

        let redirect = self.provider.post_logout_redirect_uri.as_deref();
        if id_token_hint.is_some() || redirect.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(hint) = id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
            if let Some(redirect) = redirect {
                query.append_pair("post_logout_redirect_uri", redirect);
            }
        }

        Ok(url.to_string())
    }
}

/// Renders an OAuth error body (`error`, `error_description`) for logs,
/// falling back to the truncated raw body.
fn oauth_error_summary(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct OAuthError {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    }

    match serde_json::from_str::<OAuthError>(body) {
        Ok(OAuthError {
            error,
            error_description: Some(description),
        }) => format!("{error}: {description}"),
        Ok(OAuthError { error, .. }) => error,
        Err(_) => body.chars().take(200).collect(),
    }
}
