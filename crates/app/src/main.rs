//! Scaffolding - share a game room over a mesh network
//!
//! `host` serves the room next to a running game server; `join` connects to
//! a room by its code and forwards the game server to loopback.

use std::process::ExitCode;

use clap::Parser;
use scaffolding_core::RoomCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod config;
mod error;
mod network;

use cli::{Cli, Cmd};
use config::AppConfig;
use error::AppError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(AppConfig::default_path);
    let config = match config_path.as_deref() {
        Some(path) => match AppConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    tracing::debug!(config = ?config_path, "Loaded configuration");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.cmd, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cmd: Cmd, config: AppConfig) -> Result<(), AppError> {
    match cmd {
        Cmd::Host {
            room_code,
            server_port,
            name,
            listen_port,
        } => {
            tracing::info!("Starting Scaffolding host");
            network::host(&config, room_code, server_port, listen_port, name).await
        }
        Cmd::Join { room_code, name } => {
            tracing::info!("Starting Scaffolding guest");
            network::join(&config, &room_code, name).await
        }
        Cmd::RoomCode => {
            println!("{}", RoomCode::generate());
            Ok(())
        }
    }
}
