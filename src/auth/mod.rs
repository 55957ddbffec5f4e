//! OpenID Connect token lifecycle
//!
//! This module keeps a relying party's session tokens usable:
//!
//! - [`manager`]: expiry checks, refresh orchestration, token persistence
//! - [`session`]: the session key-value store the tokens live in
//! - [`client`]: the protocol client that talks to the identity provider
//! - [`factory`]: builds protocol clients from configuration
//! - [`discovery`]: provider metadata lookup
//! - [`token`]: token endpoint responses and their validation
//! - [`lock`]: per-session refresh serialization

pub mod client;
pub mod discovery;
pub mod factory;
pub mod lock;
pub mod manager;
pub mod session;
pub mod token;

pub use client::{ClientConfig, OidcClient, ProtocolClient, ProviderSettings};
pub use factory::{ClientFactory, OidcClientFactory};
pub use lock::SessionLocks;
pub use manager::{RefreshOutcome, TokenManager};
pub use session::{JsonFileSession, MemorySession, SessionKey, SessionStore};
pub use token::TokenResponse;
