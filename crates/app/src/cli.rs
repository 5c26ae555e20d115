use std::path::PathBuf;

use clap::{Parser, Subcommand};
use scaffolding_net::DEFAULT_PORT;

#[derive(Debug, Parser)]
#[command(name = "scaffolding", version, about = "Share a game room over a mesh network")]
pub struct Cli {
    /// Path to config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Host a room for a running game server
    Host {
        /// Room code to use; a new one is generated when omitted
        #[arg(long)]
        room_code: Option<String>,
        /// Port of the local game server
        #[arg(long)]
        server_port: u16,
        /// Player name (overrides config)
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value_t = DEFAULT_PORT)]
        listen_port: u16,
    },
    /// Join a room by its code
    Join {
        #[arg(long)]
        room_code: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Print a freshly generated room code
    RoomCode,
}
