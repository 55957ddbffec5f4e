//! oidc-login - OpenID Connect session token maintenance
//!
#![doc = "oidc-login - OpenID Connect session token maintenance"]
#![doc = "Main entry point for the oidc-login command."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use oidc_login::cli::{Cli, Commands};
use oidc_login::clock::SystemClock;
use oidc_login::commands;
use oidc_login::config::Config;

/// Exit status reported when the user has to log in again.
const EXIT_LOGIN_REQUIRED: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path)?;

    // Execute command
    match cli.command {
        Commands::Refresh { session } => {
            // Validate configuration only where the provider is contacted
            config.validate()?;
            tracing::info!("Checking session {}", session.display());

            if commands::refresh::run_refresh(config, &session).await? {
                println!("valid");
            } else {
                println!("login-required");
                std::process::exit(EXIT_LOGIN_REQUIRED);
            }
            Ok(())
        }
        Commands::Status { session } => {
            let status = commands::status::run_status(&session, &SystemClock)?;
            println!("{status}");
            Ok(())
        }
        Commands::LogoutUrl { session } => {
            match commands::logout::run_logout_url(config, &session)? {
                Some(url) => println!("{url}"),
                None => tracing::warn!("No logout URL cached in {}", session.display()),
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "oidc_login=debug"
    } else {
        "oidc_login=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
