//! Token lifecycle manager
//!
//! [`TokenManager`] decides, once per request, whether the access token in a
//! user session can still be trusted.  When it cannot, the manager spends the
//! session's refresh token at the identity provider, stores the new token
//! set, and keeps a previously cached logout URL in step with the new tokens.
//!
//! The manager holds no token state of its own.  Every decision is a
//! function of the injected session, configuration, and clock.
//!
//! # Outcome contract
//!
//! [`TokenManager::refresh_tokens`] answers `Ok(true)` when the session holds
//! a usable access token afterwards and `Ok(false)` when the user has to log
//! in again.  Refresh-time failures never surface as errors; only
//! configuration problems (malformed provider settings, unknown routes) do.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use oidc_login::auth::factory::OidcClientFactory;
//! use oidc_login::auth::manager::TokenManager;
//! use oidc_login::auth::session::MemorySession;
//! use oidc_login::config::Config;
//! use oidc_login::url_generator::BaseUrlGenerator;
//!
//! # async fn example() -> oidc_login::error::Result<()> {
//! let config = Arc::new(Config::load("config.yaml")?);
//! let urls = Arc::new(BaseUrlGenerator::new(&config.base_url, &config.app_name)?);
//! let factory = Arc::new(OidcClientFactory::new(config.clone()));
//! let session = Arc::new(MemorySession::new("session-1"));
//!
//! let manager = TokenManager::new(config.app_name.clone(), session, config, urls, factory);
//! if !manager.refresh_tokens().await? {
//!     println!("login required");
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::client::ProtocolClient;
use crate::auth::factory::ClientFactory;
use crate::auth::lock::SessionLocks;
use crate::auth::session::{SessionKey, SessionStore};
use crate::auth::token::{fingerprint, TokenResponse};
use crate::clock::{Clock, SystemClock};
use crate::config::{keys, SystemConfig, DEFAULT_REFRESH_TIMEOUT_SECONDS};
use crate::error::{RefreshError, Result};
use crate::url_generator::UrlGenerator;

/// Successful outcomes of a refresh check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cached access token had not expired; nothing was done.
    StillValid,
    /// A new token set was obtained and stored.
    Refreshed,
}

/// Coordinates expiry checks, refresh exchanges, and token persistence for
/// one user session.
///
/// Managers are cheap to build per request.  All of them serialize refreshes
/// through the process-wide [`SessionLocks::global`] registry, so concurrent
/// requests of the same session refresh only once.
pub struct TokenManager {
    app_name: String,
    session: Arc<dyn SessionStore>,
    config: Arc<dyn SystemConfig>,
    urls: Arc<dyn UrlGenerator>,
    factory: Arc<dyn ClientFactory>,
    clock: Arc<dyn Clock>,
    locks: Arc<SessionLocks>,
}

impl TokenManager {
    /// Creates a manager using the system clock and the process-wide lock
    /// registry.
    ///
    /// # Arguments
    ///
    /// * `app_name` - Application identity; the callback route is
    ///   `<app_name>.login.oidc`.
    /// * `session` - Session the manager reads and writes.
    /// * `config` - Settings accessor (timeouts, logout URL override).
    /// * `urls` - Resolves the callback route to an absolute URL.
    /// * `factory` - Builds the protocol client for a refresh.
    pub fn new(
        app_name: impl Into<String>,
        session: Arc<dyn SessionStore>,
        config: Arc<dyn SystemConfig>,
        urls: Arc<dyn UrlGenerator>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            session,
            config,
            urls,
            factory,
            clock: Arc::new(SystemClock),
            locks: SessionLocks::global(),
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the lock registry, isolating this manager from the global one.
    pub fn with_locks(mut self, locks: Arc<SessionLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Ensures the session holds a usable access token.
    ///
    /// Returns `Ok(true)` when the cached token is still valid or a refresh
    /// succeeded, `Ok(false)` when there is no refresh token or the refresh
    /// failed.  Failures are logged and leave the session untouched.
    ///
    /// # Errors
    ///
    /// Returns an error only for configuration problems encountered while
    /// building the protocol client.
    pub async fn refresh_tokens(&self) -> Result<bool> {
        match self.try_refresh().await? {
            Ok(_) => Ok(true),
            Err(RefreshError::MissingRefreshToken) => Ok(false),
            Err(e) => {
                tracing::error!(
                    session_id = self.session.id(),
                    kind = e.kind(),
                    error = %e,
                    "Token refresh failed"
                );
                Ok(false)
            }
        }
    }

    /// Same decision as [`refresh_tokens`](Self::refresh_tokens), with the
    /// failure kind preserved.
    ///
    /// The outer `Result` carries configuration errors; the inner one the
    /// refresh outcome.  Nothing is logged at error level here.
    ///
    /// # Errors
    ///
    /// Returns an error if the callback route cannot be resolved or the
    /// client factory rejects the configuration.
    pub async fn try_refresh(&self) -> Result<std::result::Result<RefreshOutcome, RefreshError>> {
        if self.access_token_is_valid() {
            return Ok(Ok(RefreshOutcome::StillValid));
        }

        let _guard = self.locks.acquire(self.session.id()).await;

        // A concurrent request may have refreshed while this one waited.
        if self.access_token_is_valid() {
            return Ok(Ok(RefreshOutcome::StillValid));
        }

        let Some(refresh_token) = self.refresh_token() else {
            tracing::debug!(session_id = self.session.id(), "Refresh token not found");
            return Ok(Err(RefreshError::MissingRefreshToken));
        };

        let route = format!("{}.login.oidc", self.app_name);
        let callback_url = self.urls.link_to_route_absolute(&route)?;
        let client = self.factory.create_client(&callback_url)?;

        tracing::debug!(session_id = self.session.id(), "Refreshing token");
        Ok(self.refresh_with(client.as_ref(), &refresh_token).await)
    }

    /// Writes a token set into the session.
    ///
    /// The expiry is computed as `now + expires_in`.  The access token,
    /// refresh token, expiry, and (when present) ID token are written as one
    /// unit; nothing is written if the response does not validate.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::InvalidTokenResponse`] for empty tokens or a
    /// negative `expires_in`.
    pub fn store_tokens(&self, response: &TokenResponse) -> std::result::Result<(), RefreshError> {
        let now = self.clock.now();
        let expires_at = response.expires_at(now)?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            let old = self.session.get(SessionKey::AccessToken).unwrap_or_default();
            tracing::debug!(
                session_id = self.session.id(),
                old_access_token = %fingerprint(&old),
                new_access_token = %fingerprint(&response.access_token),
                expires_at,
                "Storing tokens"
            );
        }

        let mut entries = vec![
            (SessionKey::AccessToken, response.access_token.clone()),
            (SessionKey::RefreshToken, response.refresh_token.clone()),
            (SessionKey::AccessTokenExpiresAt, expires_at.to_string()),
        ];
        if let Some(id_token) = &response.id_token {
            entries.push((SessionKey::IdToken, id_token.clone()));
        }
        self.session.set_many(entries);
        Ok(())
    }

    /// Cached logout URL, if one has been stored.
    pub fn logout_url(&self) -> Option<String> {
        self.session.get(SessionKey::LogoutUrl)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    async fn refresh_with(
        &self,
        client: &dyn ProtocolClient,
        refresh_token: &str,
    ) -> std::result::Result<RefreshOutcome, RefreshError> {
        let response = self.bounded(client.refresh_token(refresh_token)).await?;
        self.store_tokens(&response)?;

        // The new tokens are already stored; a failure below keeps the
        // previous logout URL and is reported to the caller.
        if self.logout_url().is_some_and(|url| !url.is_empty()) {
            tracing::debug!(session_id = self.session.id(), "Updating logout URL");
            let override_url = self.config.get_optional(keys::LOGOUT_URL);
            let id_token = response
                .id_token
                .clone()
                .or_else(|| self.session.get(SessionKey::IdToken));
            let logout_url = self
                .bounded(client.end_session_url(override_url.as_deref(), id_token.as_deref()))
                .await
                .map_err(|e| match e {
                    RefreshError::ProviderCommunication(msg) => RefreshError::ProviderCommunication(
                        format!("end-session URL resolution failed: {msg}"),
                    ),
                    other => other,
                })?;
            self.session.set(SessionKey::LogoutUrl, logout_url);
        }

        tracing::debug!(session_id = self.session.id(), "Token refreshed");
        Ok(RefreshOutcome::Refreshed)
    }

    /// Runs a provider call under the configured timeout.
    async fn bounded<T, F>(&self, call: F) -> std::result::Result<T, RefreshError>
    where
        F: Future<Output = std::result::Result<T, RefreshError>>,
    {
        let secs = self
            .config
            .get_u64(keys::REFRESH_TIMEOUT, DEFAULT_REFRESH_TIMEOUT_SECONDS)
            .max(1);
        tokio::time::timeout(Duration::from_secs(secs), call)
            .await
            .map_err(|_| RefreshError::Timeout(secs))?
    }

    fn access_token_is_valid(&self) -> bool {
        let raw = self.session.get(SessionKey::AccessTokenExpiresAt);
        tracing::debug!(
            session_id = self.session.id(),
            expires = raw.as_deref().unwrap_or(""),
            "Checking if token should be refreshed"
        );

        let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
            return false;
        };
        let Ok(expires_at) = raw.trim().parse::<i64>() else {
            tracing::warn!(
                session_id = self.session.id(),
                expires = %raw,
                "Ignoring unparsable token expiry"
            );
            return false;
        };

        let leeway = i64::try_from(self.config.get_u64(keys::EXPIRY_LEEWAY, 0)).unwrap_or(i64::MAX);
        let valid = expires_at > self.clock.now().saturating_add(leeway);
        if valid {
            tracing::debug!(session_id = self.session.id(), "Token not yet expired");
        }
        valid
    }

    fn refresh_token(&self) -> Option<String> {
        self.session
            .get(SessionKey::RefreshToken)
            .filter(|token| !token.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
