//! Host discovery on the mesh
//!
//! Advertisements take a while to propagate, so clients poll the peer list
//! with a bounded, fixed-spacing retry policy. This is the only retry loop
//! in the crate; protocol reads never retry.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{ConnectionError, Result};
use crate::mesh::MeshNetwork;
use crate::protocol::SERVER_HOSTNAME_PREFIX;

/// Bounded attempts with a fixed delay before each one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `attempt` until it yields a value.
    ///
    /// `Ok(None)` means "not yet" and is retried; an error aborts at once.
    /// Exhausting every attempt fails with `ConnectionError::Timeout`.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        for n in 1..=self.max_attempts {
            tokio::time::sleep(self.delay).await;
            if let Some(value) = attempt(n).await? {
                return Ok(value);
            }
        }
        Err(ConnectionError::Timeout.into())
    }
}

/// A host found on the mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredServer {
    pub hostname: String,
    pub ipv4: String,
    /// Scaffolding listener port on the host
    pub port: u16,
}

/// Poll the mesh for a node advertising `scaffolding-mc-server-<port>`.
///
/// The first advertising peer wins. A peer-list failure counts as a miss.
pub async fn discover_server<M: MeshNetwork>(
    mesh: &M,
    policy: &RetryPolicy,
) -> Result<DiscoveredServer> {
    policy
        .run(|attempt| async move {
            let peers = match mesh.list_peers().await {
                Ok(peers) => peers,
                Err(e) => {
                    debug!(attempt, error = %e, "Peer list unavailable");
                    return Ok(None);
                }
            };

            let Some(peer) = peers
                .into_iter()
                .find(|p| p.hostname.starts_with(SERVER_HOSTNAME_PREFIX))
            else {
                debug!(attempt, "No scaffolding server advertised yet");
                return Ok(None);
            };

            info!(hostname = %peer.hostname, ipv4 = %peer.ipv4, "Found scaffolding server");
            let port = parse_port(&peer.hostname[SERVER_HOSTNAME_PREFIX.len()..])?;
            Ok(Some(DiscoveredServer {
                hostname: peer.hostname,
                ipv4: peer.ipv4,
                port,
            }))
        })
        .await
}

/// Parse a non-zero TCP port
pub fn parse_port(s: &str) -> std::result::Result<u16, ConnectionError> {
    match s.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConnectionError::InvalidPort(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::error::Error;
    use crate::mesh::fake::FakeMesh;
    use crate::mesh::Peer;

    #[tokio::test(start_paused = true)]
    async fn test_policy_exhaustion_is_timeout() {
        let policy = RetryPolicy::default();
        let started = tokio::time::Instant::now();

        let result: Result<()> = policy.run(|_| async { Ok(None) }).await;

        assert!(result.unwrap_err().is_timeout());
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_stops_on_first_hit() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let mut calls = 0;

        let value = policy
            .run(|n| {
                calls += 1;
                async move { Ok((n == 3).then_some(n)) }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_after_propagation_delay() {
        let mesh = FakeMesh::advertising("scaffolding-mc-server-13452", 3);
        let started = tokio::time::Instant::now();

        let server = discover_server(&mesh, &RetryPolicy::default()).await.unwrap();

        assert_eq!(server.port, 13452);
        assert_eq!(server.ipv4, "127.0.0.1");
        assert_eq!(mesh.polls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_times_out() {
        let mesh = FakeMesh::default();
        let err = discover_server(&mesh, &RetryPolicy::default())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(mesh.polls.load(Ordering::SeqCst), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_invalid_port() {
        let mesh = FakeMesh {
            peers: vec![Peer {
                ipv4: "10.0.0.2".into(),
                hostname: "scaffolding-mc-server-notaport".into(),
                tunnel_protocols: Vec::new(),
            }],
            ..FakeMesh::default()
        };

        let err = discover_server(&mesh, &RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::InvalidPort(ref p)) if p == "notaport"
        ));
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("25565"), Ok(25565));
        assert!(parse_port("0").is_err());
        assert!(parse_port("65536").is_err());
        assert!(parse_port("").is_err());
    }
}
