//! Application error types

use std::io;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Application errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Net(#[from] scaffolding_net::Error),

    #[error(transparent)]
    RoomCode(#[from] scaffolding_core::RoomCodeError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
