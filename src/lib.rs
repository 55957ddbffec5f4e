//! oidc-login - OpenID Connect token lifecycle library
//!
//! This library keeps the access token of an OpenID Connect relying party
//! session usable.  On every request the host asks a [`TokenManager`]
//! whether the session is still authenticated; the manager refreshes expired
//! tokens with the stored refresh token and reports whether the user has to
//! log in again.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: Token manager, session stores, protocol client and factory
//! - `clock`: Time source abstraction
//! - `url_generator`: Absolute URLs for named application routes
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Command handlers for the CLI
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use oidc_login::auth::{MemorySession, OidcClientFactory, TokenManager};
//! use oidc_login::url_generator::BaseUrlGenerator;
//! use oidc_login::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     config.validate()?;
//!
//!     let urls = BaseUrlGenerator::new(&config.base_url, &config.app_name)?;
//!     let app_name = config.app_name.clone();
//!     let config = Arc::new(config);
//!     let manager = TokenManager::new(
//!         app_name,
//!         Arc::new(MemorySession::new("session-1")),
//!         config.clone(),
//!         Arc::new(urls),
//!         Arc::new(OidcClientFactory::new(config)),
//!     );
//!
//!     println!("authenticated: {}", manager.refresh_tokens().await?);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod url_generator;

// Re-export commonly used types
pub use auth::{RefreshOutcome, SessionKey, SessionStore, TokenManager, TokenResponse};
pub use config::Config;
pub use error::{OidcLoginError, RefreshError, Result};
