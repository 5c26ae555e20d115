//! Scaffolding Network Library
//!
//! Framed request/response protocol for sharing a game room over a mesh
//! network.
//!
//! # Architecture
//!
//! - **Server**: Run by the host, answers requests and tracks the room roster
//! - **Client**: Connects to a host's server and mirrors its roster
//! - **Frame**: Length-prefixed binary request/response frames
//! - **Mesh**: Virtual network used to reach the host (EasyTier)
//!
//! # Usage
//!
//! ```ignore
//! // Host starts a server and opens the room on the mesh
//! let server = Server::start(ServerConfig::new(code, host, 25565)).await?;
//! server.create_room(&mesh).await?;
//!
//! // Guest joins with the room code and heartbeats until done
//! let client = Client::join(&mesh, code, player, &ClientConfig::default()).await?;
//! loop {
//!     tokio::time::sleep(HEARTBEAT_INTERVAL).await;
//!     client.heartbeat().await?;
//! }
//! ```

pub mod bounded;
pub mod buffer;
pub mod client;
pub mod discovery;
pub mod dispatcher;
pub mod easytier;
pub mod error;
pub mod frame;
pub mod lifecycle;
pub mod mesh;
pub mod protocol;
pub mod registry;
pub mod server;

pub use buffer::ByteBuffer;
pub use client::{Client, ClientConfig, HEARTBEAT_INTERVAL};
pub use discovery::{DiscoveredServer, RetryPolicy};
pub use dispatcher::{Dispatcher, RequestContext, RequestHandler};
pub use easytier::EasyTier;
pub use error::{ConnectionError, Error, MeshError, ProtocolError, Result};
pub use frame::{Request, Response};
pub use lifecycle::{ConnectionState, Lifecycle};
pub use mesh::{MeshNetwork, Peer};
pub use protocol::DEFAULT_PORT;
pub use registry::{ConnectionId, ConnectionRegistry};
pub use server::{Server, ServerConfig};
