//! Duel - tic-tac-toe matchmaking server
//!
//! Loads configuration, installs tracing and runs the selected command.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use duel_server::{ServerConfig, serve};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, host, port } => {
            let mut settings = ServerConfig::load(config.as_deref())?;
            if let Some(host) = host {
                settings = settings.with_host(host);
            }
            if let Some(port) = port {
                settings = settings.with_port(port);
            }

            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter())),
                )
                .init();

            info!(host = %settings.host(), port = settings.port(), "Starting duel server");
            serve(settings).await
        }
        Command::PrintConfig { config } => {
            let settings = ServerConfig::load(config.as_deref())?;
            print!("{}", settings.to_toml()?);
            Ok(())
        }
    }
}
