//! Absolute URL generation for named routes
//!
//! The token manager needs the absolute callback URL of the login route to
//! configure a protocol client.  Hosts with their own router implement
//! [`UrlGenerator`]; [`BaseUrlGenerator`] serves standalone deployments by
//! joining a fixed route table onto a base URL.

use std::collections::HashMap;

use url::Url;

use crate::error::{OidcLoginError, Result};

/// Resolves route names to absolute URLs.
pub trait UrlGenerator: Send + Sync {
    /// Returns the absolute URL for `route_name`.
    ///
    /// # Errors
    ///
    /// Returns [`OidcLoginError::Config`] when the route is unknown.
    fn link_to_route_absolute(&self, route_name: &str) -> Result<String>;
}

/// Route table keyed by fully qualified route name (`<app>.<controller>.<action>`).
///
/// # Examples
///
/// ```
/// use oidc_login::url_generator::{BaseUrlGenerator, UrlGenerator};
///
/// let urls = BaseUrlGenerator::new("https://cloud.example.com/", "oidc_login").unwrap();
/// assert_eq!(
///     urls.link_to_route_absolute("oidc_login.login.oidc").unwrap(),
///     "https://cloud.example.com/apps/oidc_login/oidc"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct BaseUrlGenerator {
    base: Url,
    routes: HashMap<String, String>,
}

impl BaseUrlGenerator {
    /// Creates a generator serving the login route of `app_name`.
    ///
    /// # Errors
    ///
    /// Returns [`OidcLoginError::Config`] if `base_url` is not an absolute URL.
    pub fn new(base_url: &str, app_name: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| OidcLoginError::Config(format!("base_url is not a valid URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(OidcLoginError::Config(format!(
                "base_url cannot be used as a base: {base_url}"
            ))
            .into());
        }
        // Url::join drops the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut routes = HashMap::new();
        routes.insert(
            format!("{app_name}.login.oidc"),
            format!("apps/{app_name}/oidc"),
        );

        Ok(Self { base, routes })
    }
}

impl UrlGenerator for BaseUrlGenerator {
    fn link_to_route_absolute(&self, route_name: &str) -> Result<String> {
        let path = self
            .routes
            .get(route_name)
            .ok_or_else(|| OidcLoginError::Config(format!("unknown route: {route_name}")))?;
        Ok(self.base.join(path)?.to_string())
    }
}
