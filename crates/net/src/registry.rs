//! Active-connection registry
//!
//! Tracks every accepted connection on the server, its lifecycle and the
//! `machine_id` it announced through `c:player_ping`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::lifecycle::{ConnectionState, Lifecycle};

/// Server-side connection identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// One tracked connection
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    /// Set by the connection's first successful player announce
    pub machine_id: Option<String>,
    pub lifecycle: Lifecycle,
}

impl ConnectionRecord {
    pub fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    records: Mutex<HashMap<ConnectionId, ConnectionRecord>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection in the `Connecting` state
    pub fn insert(&self, peer: SocketAddr) -> ConnectionRecord {
        let record = ConnectionRecord {
            id: ConnectionId::new(),
            peer,
            machine_id: None,
            lifecycle: Lifecycle::new(),
        };
        self.lock().insert(record.id, record.clone());
        record
    }

    /// Associate `machine_id` with a connection.
    ///
    /// The first binding sticks. Returns the machine id the connection is
    /// bound to afterwards, or `None` for an unknown connection.
    pub fn bind_machine_id(&self, id: ConnectionId, machine_id: &str) -> Option<String> {
        let mut records = self.lock();
        let record = records.get_mut(&id)?;
        Some(
            record
                .machine_id
                .get_or_insert_with(|| machine_id.to_string())
                .clone(),
        )
    }

    pub fn machine_id(&self, id: ConnectionId) -> Option<String> {
        self.lock().get(&id).and_then(|r| r.machine_id.clone())
    }

    /// Stop tracking a connection. Only the first call returns the record.
    pub fn remove(&self, id: ConnectionId) -> Option<ConnectionRecord> {
        self.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, ConnectionRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
