//! Error types for Scaffolding Core

use thiserror::Error;

/// Malformed room identifier, rejected before any network action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomCodeError {
    #[error("Invalid room code: {0:?}")]
    InvalidRoomCode(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    RoomCode(#[from] RoomCodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
