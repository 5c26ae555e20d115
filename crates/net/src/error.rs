//! Network error types

use std::io;

use scaffolding_core::RoomCodeError;

use crate::lifecycle::ConnectionState;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Terminal failures of the connection operation in progress
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Timed out")]
    Timeout,

    #[error("Invalid port: {0:?}")]
    InvalidPort(String),

    #[error("Not connected")]
    MissingConnection,

    #[error("Connection is {0:?}")]
    InvalidConnectionState(ConnectionState),

    #[error("Connection cancelled")]
    Cancelled,

    #[error("Peer closed the connection")]
    OrderlyShutdown,
}

/// Violations that are fatal to a single connection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unknown request: {0}")]
    UnknownRequest(String),

    #[error("Malformed body: {0}")]
    Malformed(String),

    #[error("Read past end of buffer: need {need} bytes, {available} available")]
    Truncated { need: usize, available: usize },

    #[error("Request type is {0} bytes (max 255)")]
    TagTooLong(usize),

    #[error("Frame body too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("Request {request} failed with status {status}")]
    RequestFailed { request: String, status: u8 },
}

/// Mesh-network collaborator failures
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("Failed to run mesh process: {0}")]
    Launch(#[source] io::Error),

    #[error("Mesh CLI error: {0}")]
    Cli(String),

    #[error("Unexpected mesh CLI output: {0}")]
    Parse(String),
}

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    RoomCode(#[from] RoomCodeError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<scaffolding_core::Error> for Error {
    fn from(e: scaffolding_core::Error) -> Self {
        match e {
            scaffolding_core::Error::RoomCode(e) => Error::RoomCode(e),
            scaffolding_core::Error::Io(e) => Error::Io(e),
            scaffolding_core::Error::Serialization(e) => Error::Json(e),
        }
    }
}

impl Error {
    /// True for a deadline win in a bounded wait
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::Timeout))
    }

    /// True when the peer closed the stream or the session was cancelled
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Error::Connection(ConnectionError::OrderlyShutdown | ConnectionError::Cancelled)
        )
    }
}
