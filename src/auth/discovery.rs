//! OpenID Connect provider discovery
//!
//! The protocol client needs two endpoints from the identity provider: the
//! token endpoint for refresh exchanges and the end-session endpoint for
//! logout URLs.  Both come from the issuer's discovery document
//! (OpenID Connect Discovery 1.0 section 4), located by appending
//! `/.well-known/openid-configuration` to the issuer path.
//!
//! Failures here happen at refresh time and are reported as
//! [`RefreshError::ProviderCommunication`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RefreshError;

/// Subset of the OpenID provider metadata used by this crate.
///
/// # Examples
///
/// ```
/// use oidc_login::auth::discovery::ProviderMetadata;
///
/// let json = r#"{
///     "issuer": "https://idp.example.com",
///     "token_endpoint": "https://idp.example.com/token",
///     "end_session_endpoint": "https://idp.example.com/logout"
/// }"#;
///
/// let meta: ProviderMetadata = serde_json::from_str(json).unwrap();
/// assert_eq!(meta.token_endpoint, "https://idp.example.com/token");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier of the provider.
    pub issuer: String,

    /// URL of the token endpoint (RFC 6749 section 3.2).
    pub token_endpoint: String,

    /// URL of the authorization endpoint; unused by refresh but commonly
    /// present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    /// URL of the RP-initiated logout endpoint
    /// (OpenID Connect RP-Initiated Logout 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// Additional metadata fields not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Builds `<issuer>/.well-known/openid-configuration`.
///
/// Trailing slashes on the issuer path are dropped before appending, and any
/// query or fragment is removed.
pub fn well_known_url(issuer: &Url) -> Url {
    let path = issuer.path().trim_end_matches('/');
    let mut url = issuer.clone();
    url.set_path(&format!("{path}/.well-known/openid-configuration"));
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Fetches the provider metadata document for `issuer`.
///
/// # Errors
///
/// Returns [`RefreshError::ProviderCommunication`] if the request fails, the
/// provider answers with a non-success status, or the body does not parse.
pub async fn fetch_provider_metadata(
    http: &reqwest::Client,
    issuer: &Url,
) -> Result<ProviderMetadata, RefreshError> {
    let url = well_known_url(issuer);
    tracing::debug!(url = %url, "Fetching provider discovery document");

    let resp = http.get(url.clone()).send().await.map_err(|e| {
        RefreshError::ProviderCommunication(format!("discovery request to {url} failed: {e}"))
    })?;

    if !resp.status().is_success() {
        return Err(RefreshError::ProviderCommunication(format!(
            "discovery endpoint {url} returned {}",
            resp.status()
        )));
    }

    resp.json::<ProviderMetadata>().await.map_err(|e| {
        RefreshError::ProviderCommunication(format!("failed to parse discovery document: {e}"))
    })
}
