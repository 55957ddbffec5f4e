/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes three top-level command modules:

- `refresh` - Refresh the tokens of a session file when they have expired
- `status`  - Report the token state of a session file
- `logout`  - Print the cached logout URL of a session file

Each handler loads the session file, works through a [`TokenManager`] and
writes the file back only when the session changed.
*/

use std::path::Path;
use std::sync::Arc;

use crate::auth::{JsonFileSession, OidcClientFactory, SessionStore, TokenManager};
use crate::config::Config;
use crate::error::Result;
use crate::url_generator::BaseUrlGenerator;

/// Builds a token manager for `session` wired to the standalone adapters.
///
/// # Errors
///
/// Returns an error if the configured base URL is not a valid URL.
pub fn build_manager(config: Config, session: Arc<dyn SessionStore>) -> Result<TokenManager> {
    let urls = BaseUrlGenerator::new(&config.base_url, &config.app_name)?;
    let app_name = config.app_name.clone();
    let config = Arc::new(config);
    let factory = OidcClientFactory::new(config.clone());

    Ok(TokenManager::new(
        app_name,
        session,
        config,
        Arc::new(urls),
        Arc::new(factory),
    ))
}

// Refresh command handler
pub mod refresh {
    //! Token refresh handler.

    use super::*;

    /// Refresh the tokens stored in `session_path` if they have expired
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration
    /// * `session_path` - Path to the JSON session file
    ///
    /// # Returns
    ///
    /// Returns `true` when the session holds a usable access token afterwards,
    /// `false` when the user has to log in again.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be read or written, or the
    /// provider configuration is invalid.
    pub async fn run_refresh(config: Config, session_path: &Path) -> Result<bool> {
        let session = Arc::new(JsonFileSession::load(session_path)?);
        tracing::debug!(session_id = session.id(), "Loaded session");

        let manager = build_manager(config, session.clone())?;
        let authenticated = manager.refresh_tokens().await?;

        if session.is_dirty() {
            session.flush()?;
            tracing::info!(path = %session_path.display(), "Session updated");
        }
        Ok(authenticated)
    }
}

// Status command handler
pub mod status {
    //! Session inspection handler.

    use super::*;
    use crate::auth::SessionKey;
    use crate::clock::Clock;
    use std::fmt;

    /// State of the cached access token relative to the current time.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum AccessTokenState {
        /// No expiry is stored.
        Absent,
        /// The token is valid for `expires_in` more seconds.
        Valid { expires_in: i64 },
        /// The token expired `expired_for` seconds ago.
        Expired { expired_for: i64 },
        /// The stored expiry is not a timestamp.
        Unreadable(String),
    }

    /// Summary of the token lifecycle keys of one session.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SessionStatus {
        pub session_id: String,
        pub access_token: AccessTokenState,
        pub has_refresh_token: bool,
        pub has_id_token: bool,
        pub logout_url: Option<String>,
    }

    impl SessionStatus {
        /// Inspects `session` at time `now`.  Nothing is written.
        pub fn inspect(session: &dyn SessionStore, now: i64) -> Self {
            let present = |key| session.get(key).is_some_and(|v: String| !v.trim().is_empty());

            let access_token = match session.get(SessionKey::AccessTokenExpiresAt) {
                None => AccessTokenState::Absent,
                Some(raw) if raw.trim().is_empty() => AccessTokenState::Absent,
                Some(raw) => match raw.trim().parse::<i64>() {
                    Ok(expires_at) if expires_at > now => AccessTokenState::Valid {
                        expires_in: expires_at - now,
                    },
                    Ok(expires_at) => AccessTokenState::Expired {
                        expired_for: now.saturating_sub(expires_at),
                    },
                    Err(_) => AccessTokenState::Unreadable(raw),
                },
            };

            Self {
                session_id: session.id().to_string(),
                access_token,
                has_refresh_token: present(SessionKey::RefreshToken),
                has_id_token: present(SessionKey::IdToken),
                logout_url: session.get(SessionKey::LogoutUrl),
            }
        }
    }

    impl fmt::Display for SessionStatus {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "session:       {}", self.session_id)?;
            match &self.access_token {
                AccessTokenState::Absent => writeln!(f, "access token:  absent")?,
                AccessTokenState::Valid { expires_in } => {
                    writeln!(f, "access token:  valid (expires in {expires_in}s)")?
                }
                AccessTokenState::Expired { expired_for } => {
                    writeln!(f, "access token:  expired ({expired_for}s ago)")?
                }
                AccessTokenState::Unreadable(raw) => {
                    writeln!(f, "access token:  unreadable expiry {raw:?}")?
                }
            }
            let yes_no = |b: bool| if b { "yes" } else { "no" };
            writeln!(f, "refresh token: {}", yes_no(self.has_refresh_token))?;
            writeln!(f, "id token:      {}", yes_no(self.has_id_token))?;
            write!(
                f,
                "logout url:    {}",
                self.logout_url.as_deref().unwrap_or("-")
            )
        }
    }

    /// Report the token state of the session stored in `session_path`
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be read.
    pub fn run_status(session_path: &Path, clock: &dyn Clock) -> Result<SessionStatus> {
        let session = JsonFileSession::load(session_path)?;
        Ok(SessionStatus::inspect(&session, clock.now()))
    }
}

// Logout URL command handler
pub mod logout {
    //! Logout URL lookup handler.

    use super::*;

    /// Return the logout URL cached in the session stored in `session_path`
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be read or the base URL is
    /// invalid.
    pub fn run_logout_url(config: Config, session_path: &Path) -> Result<Option<String>> {
        let session = Arc::new(JsonFileSession::load(session_path)?);
        let manager = build_manager(config, session)?;
        Ok(manager.logout_url())
    }
}
