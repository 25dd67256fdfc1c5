//! Gatekeeper
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                      GATEKEEPER                       │
//!                    │                                                       │
//!  Browser / API     │  ┌─────────┐   ┌──────────────┐   ┌──────────────┐   │
//!  ──────────────────┼─▶│  http   │──▶│ auth session │──▶│   security   │───┼──▶ Upstream
//!                    │  │ server  │   │ + cookies    │   │   headers    │   │
//!                    │  └─────────┘   └──────┬───────┘   └──────────────┘   │
//!                    │                       │ refresh / code exchange       │
//!                    │                       ▼                               │
//!                    │                ┌──────────────┐                       │
//!                    │                │   provider   │◀──────────────────────┼──▶ Identity
//!                    │                └──────▲───────┘                       │    Provider
//!                    │                       │ password / refresh grants     │
//!  Service client    │  ┌─────────┐   ┌──────┴───────┐                       │
//!  ──────────────────┼─▶│  http   │──▶│  forwarding  │───────────────────────┼──▶ Target
//!   (as HTTP proxy)  │  │ server  │   │ signer+renew │                       │
//!                    │  └─────────┘   └──────────────┘                       │
//!                    └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use gatekeeper::config::loader::{read_config, ConfigError};
use gatekeeper::config::validation::validate_config;
use gatekeeper::lifecycle::{signals, startup};
use gatekeeper::observability::logging;
use gatekeeper::{GatekeeperConfig, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "gatekeeper", version, about = "OpenID Connect authenticating proxy")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(long)]
    listen: Option<String>,

    /// Run as a forward signing proxy.
    #[arg(long)]
    forwarding: bool,
}

impl Cli {
    fn load_config(&self) -> Result<GatekeeperConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => GatekeeperConfig::default(),
        };

        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if self.forwarding {
            config.forwarding.enabled = true;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = if config.is_forwarding() { "forwarding" } else { "reverse" },
        bind_address = %config.listener.bind_address,
        "gatekeeper starting"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    startup::start(config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
