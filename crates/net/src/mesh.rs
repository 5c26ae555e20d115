//! Mesh-network collaborator interface
//!
//! The Scaffolding protocol runs over a virtual LAN provided by an external
//! mesh process. Only these control-plane operations are consumed.

use std::future::Future;

use crate::error::MeshError;

/// Public relay node used to bootstrap the mesh
pub const DEFAULT_RELAY: &str = "tcp://public.easytier.cn:11010";

/// A node visible on the mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub ipv4: String,
    pub hostname: String,
    pub tunnel_protocols: Vec<String>,
}

/// Control plane of the mesh-network process
pub trait MeshNetwork: Send + Sync {
    /// Start the mesh process with `args`, killing any prior instance first
    fn launch(&self, args: &[String]) -> impl Future<Output = Result<(), MeshError>> + Send;

    fn kill(&self) -> impl Future<Output = ()> + Send;

    fn list_peers(&self) -> impl Future<Output = Result<Vec<Peer>, MeshError>> + Send;

    /// Forward TCP connections on local `bind` to `destination` on the mesh
    fn add_port_forward(
        &self,
        bind: &str,
        destination: &str,
    ) -> impl Future<Output = Result<(), MeshError>> + Send;

    fn remove_port_forward(&self, bind: &str) -> impl Future<Output = Result<(), MeshError>> + Send;
}
