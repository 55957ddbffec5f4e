//! Command-line interface definition for oidc-login
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to refresh and inspect session files.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// oidc-login - OpenID Connect session token maintenance
///
/// Keeps the tokens of a JSON session file usable by refreshing them at the
/// identity provider when the access token has expired.
#[derive(Parser, Debug, Clone)]
#[command(name = "oidc-login")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for oidc-login
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Refresh the session tokens if the access token has expired
    ///
    /// Prints `valid` and exits with status 0 when the session is usable,
    /// prints `login-required` and exits with status 2 otherwise.
    Refresh {
        /// Path to the JSON session file
        #[arg(short, long)]
        session: PathBuf,
    },

    /// Show the token state of a session without contacting the provider
    Status {
        /// Path to the JSON session file
        #[arg(short, long)]
        session: PathBuf,
    },

    /// Print the logout URL cached in a session
    LogoutUrl {
        /// Path to the JSON session file
        #[arg(short, long)]
        session: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
