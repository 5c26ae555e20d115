//! Connection lifecycle state machine
//!
//! `Connecting -> Ready -> (Failed | Cancelled)`. A connection may also fail
//! or be cancelled straight from `Connecting`. The first terminal transition
//! wins; later transitions are no-ops.

use std::time::Duration;

use tokio::sync::watch;

use crate::error::ConnectionError;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Failed,
    Cancelled,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

/// Shared, awaitable handle on one connection's state
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: watch::Sender<ConnectionState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Connecting);
        Self { tx }
    }

    pub fn state(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// `Connecting -> Ready`; false from any other state
    pub fn mark_ready(&self) -> bool {
        self.transition(ConnectionState::Ready)
    }

    pub fn fail(&self) -> bool {
        self.transition(ConnectionState::Failed)
    }

    pub fn cancel(&self) -> bool {
        self.transition(ConnectionState::Cancelled)
    }

    fn transition(&self, to: ConnectionState) -> bool {
        self.tx.send_if_modified(|state| {
            let allowed = match (*state, to) {
                (ConnectionState::Connecting, _) => to != ConnectionState::Connecting,
                (ConnectionState::Ready, next) => next.is_terminal(),
                _ => false,
            };
            if allowed {
                *state = to;
            }
            allowed
        })
    }

    /// Wait until the connection leaves `Connecting`.
    ///
    /// `Ready` succeeds; `Cancelled` and `Failed` surface as connection
    /// errors, as does the deadline passing first.
    pub async fn wait_ready(&self, deadline: Duration) -> Result<(), ConnectionError> {
        let mut rx = self.tx.subscribe();
        let state = tokio::time::timeout(
            deadline,
            rx.wait_for(|s| *s != ConnectionState::Connecting),
        )
        .await
        .map_err(|_| ConnectionError::Timeout)?
        .map(|s| *s)
        .map_err(|_| ConnectionError::Cancelled)?;

        match state {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Cancelled => Err(ConnectionError::Cancelled),
            other => Err(ConnectionError::InvalidConnectionState(other)),
        }
    }

    /// Resolve once the connection reaches a terminal state
    pub async fn closed(&self) -> ConnectionState {
        let mut rx = self.tx.subscribe();
        let state = match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => ConnectionState::Cancelled,
        };
        state
    }
}
