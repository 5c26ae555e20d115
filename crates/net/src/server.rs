//! TCP server for hosting a room
//!
//! The host runs this server. Each accepted connection gets its own receive
//! loop: read a request, dispatch it, write the response, repeat. Any read
//! failure, decode failure or unknown request ends that connection only; its
//! registry record and announced membership are removed on the way out.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use scaffolding_core::{Member, Room, RoomCode};
use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bounded::{bounded, BoundedReader, RECEIVE_TIMEOUT};
use crate::dispatcher::Dispatcher;
use crate::error::{ConnectionError, Error, ProtocolError, Result};
use crate::frame::{read_request, write_frame};
use crate::lifecycle::ConnectionState;
use crate::mesh::{MeshNetwork, DEFAULT_RELAY};
use crate::protocol::{server_hostname, DEFAULT_PORT};
use crate::registry::{ConnectionId, ConnectionRegistry};

/// Host settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Deadline for each read from a peer
    pub receive_timeout: Duration,
    /// Validated when the room is created
    pub room_code: String,
    /// The hosting player, first member of the room
    pub host: Member,
    /// Game-server port announced through `c:server_port`
    pub server_port: u16,
    pub relay: String,
}

impl ServerConfig {
    pub fn new(room_code: impl Into<String>, host: Member, server_port: u16) -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            receive_timeout: RECEIVE_TIMEOUT,
            room_code: room_code.into(),
            host,
            server_port,
            relay: DEFAULT_RELAY.to_string(),
        }
    }
}

/// State shared by every connection task
struct Shared {
    room: Arc<Room>,
    connections: ConnectionRegistry,
    dispatcher: Dispatcher,
    receive_timeout: Duration,
}

/// Room server handle
pub struct Server {
    addr: SocketAddr,
    room_code: String,
    relay: String,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl Server {
    /// Start a server serving the core requests
    pub async fn start(config: ServerConfig) -> Result<Self> {
        Self::start_with_dispatcher(config, Dispatcher::with_builtins()).await
    }

    /// Start a server with a custom handler set
    pub async fn start_with_dispatcher(config: ServerConfig, dispatcher: Dispatcher) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Scaffolding server listening");

        let shared = Arc::new(Shared {
            room: Arc::new(Room::hosted(config.host, config.server_port)),
            connections: ConnectionRegistry::new(),
            dispatcher,
            receive_timeout: config.receive_timeout,
        });

        let shutdown = CancellationToken::new();
        tokio::spawn(accept_loop(listener, shared.clone(), shutdown.clone()));

        Ok(Server {
            addr: bound_addr,
            room_code: config.room_code,
            relay: config.relay,
            shared,
            shutdown,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn room(&self) -> &Arc<Room> {
        &self.shared.room
    }

    /// Get current member list
    pub fn members(&self) -> Vec<Member> {
        self.shared.room.members()
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.shared.connections.len()
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Launch the mesh network for this room, advertising the listener.
    ///
    /// The room code is validated before the mesh is touched.
    pub async fn create_room<M: MeshNetwork>(&self, mesh: &M) -> Result<()> {
        if !self.is_running() {
            return Err(ConnectionError::InvalidConnectionState(ConnectionState::Cancelled).into());
        }
        let code = RoomCode::parse(&self.room_code)?;
        let args = host_mesh_args(
            &code,
            self.addr.port(),
            self.shared.room.server_port(),
            &self.relay,
        );
        mesh.launch(&args).await?;
        info!(room_code = %code, hostname = %server_hostname(self.addr.port()), "Room created");
        Ok(())
    }

    /// Stop accepting and close every connection
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            self.shutdown.cancel();
            info!("Server shutdown initiated");
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// `easytier-core` arguments for hosting `code`
fn host_mesh_args(code: &RoomCode, listener_port: u16, server_port: u16, relay: &str) -> Vec<String> {
    vec![
        "--no-tun".into(),
        "-d".into(),
        "--network-name".into(),
        code.network_name(),
        "--network-secret".into(),
        code.network_secret(),
        "--hostname".into(),
        server_hostname(listener_port),
        "-p".into(),
        relay.to_string(),
        format!("--tcp-whitelist={listener_port}"),
        format!("--tcp-whitelist={server_port}"),
    ]
}

/// Accept incoming connections
async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            shared.clone(),
                            shutdown.child_token(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single peer connection until it fails or is cancelled
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let record = shared.connections.insert(peer);
    let id = record.id;
    info!(peer = %peer, connection = %id, "New connection");

    let (reader, mut writer) = stream.into_split();
    let mut reader = BoundedReader::new(reader, shared.receive_timeout, cancel);
    record.lifecycle.mark_ready();

    let reason = receive_loop(&mut reader, &mut writer, id, &shared).await;
    if reason.is_closed() {
        record.lifecycle.cancel();
        info!(peer = %peer, connection = %id, "Connection closed");
    } else {
        record.lifecycle.fail();
        warn!(peer = %peer, connection = %id, error = %reason, "Connection dropped");
    }

    close_connection(&shared, id);
}

/// Serve requests until something goes wrong; returns the reason
async fn receive_loop<R, W>(
    reader: &mut BoundedReader<R>,
    writer: &mut W,
    id: ConnectionId,
    shared: &Shared,
) -> Error
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        if let Err(e) = serve_request(reader, writer, id, shared).await {
            return e;
        }
    }
}

async fn serve_request<R, W>(
    reader: &mut BoundedReader<R>,
    writer: &mut W,
    id: ConnectionId,
    shared: &Shared,
) -> Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request = read_request(reader).await?;
    debug!(connection = %id, request = %request.request_type, "Received request");

    let response = shared
        .dispatcher
        .dispatch(
            id,
            &shared.room,
            &shared.connections,
            &request.request_type,
            &request.body,
        )
        .inspect_err(|e| {
            if let ProtocolError::UnknownRequest(tag) = e {
                warn!(connection = %id, request = %tag, "Received unknown request");
            }
        })?;

    let frame = response.encode()?;
    let cancel = reader.cancel_token().clone();
    bounded(write_frame(writer, &frame), shared.receive_timeout, &cancel).await
}

/// Drop a connection's registry record and the member it announced
fn close_connection(shared: &Shared, id: ConnectionId) {
    let Some(record) = shared.connections.remove(id) else {
        return;
    };
    if let Some(machine_id) = record.machine_id {
        shared.room.leave(&machine_id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use scaffolding_core::MemberKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::frame::Request;
    use crate::mesh::fake::FakeMesh;
    use crate::protocol::request;

    fn alice() -> Member {
        Member::new("Alice", "abc", "v1", MemberKind::Host)
    }

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::new("RMxxxxxxxxxxxxxxxxxx", alice(), 25565);
        config.listen_addr = "127.0.0.1:0".parse().unwrap();
        config
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    async fn send(stream: &mut TcpStream, tag: &str, body: &[u8]) {
        let frame = Request::new(tag, body.to_vec()).encode().unwrap();
        stream.write_all(&frame).await.unwrap();
    }

    /// Read one response frame; None if the server closed the socket
    async fn recv(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
        let mut header = [0u8; 5];
        stream.read_exact(&mut header).await.ok()?;
        let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.ok()?;
        Some((header[0], body))
    }

    async fn assert_closed(stream: &mut TcpStream) {
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_server_start() {
        let server = Server::start(test_config()).await.unwrap();

        assert!(server.addr().port() > 0);
        assert_eq!(server.members(), vec![alice()]);
        assert_eq!(server.room().server_port(), 25565);
        server.stop();
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_ping_and_server_port() {
        let server = Server::start(test_config()).await.unwrap();
        let mut stream = TcpStream::connect(server.addr()).await.unwrap();

        send(&mut stream, request::PING, b"echo me").await;
        assert_eq!(recv(&mut stream).await, Some((0, b"echo me".to_vec())));

        send(&mut stream, request::SERVER_PORT, b"").await;
        assert_eq!(recv(&mut stream).await, Some((0, vec![0x63, 0xdd])));
    }

    #[tokio::test]
    async fn test_unknown_request_closes_connection() {
        let server = Server::start(test_config()).await.unwrap();
        let mut stream = TcpStream::connect(server.addr()).await.unwrap();

        send(&mut stream, "c:does_not_exist", b"").await;
        assert_closed(&mut stream).await;
        wait_until(|| server.connection_count() == 0).await;

        // Other peers are unaffected
        let mut other = TcpStream::connect(server.addr()).await.unwrap();
        send(&mut other, request::PING, b"ok").await;
        assert_eq!(recv(&mut other).await, Some((0, b"ok".to_vec())));
    }

    #[tokio::test]
    async fn test_malformed_member_closes_connection() {
        let server = Server::start(test_config()).await.unwrap();
        let mut stream = TcpStream::connect(server.addr()).await.unwrap();

        send(&mut stream, request::PLAYER_PING, b"not a member").await;
        assert_closed(&mut stream).await;
        assert_eq!(server.members().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_removes_member_and_record() {
        let server = Server::start(test_config()).await.unwrap();
        let mut stream = TcpStream::connect(server.addr()).await.unwrap();

        let bob = Member::new("Bob", "def", "v2", MemberKind::Guest);
        send(&mut stream, request::PLAYER_PING, &bob.to_bytes().unwrap()).await;
        assert_eq!(recv(&mut stream).await, Some((0, Vec::new())));
        assert_eq!(server.members().len(), 2);
        assert_eq!(server.connection_count(), 1);

        drop(stream);
        wait_until(|| server.connection_count() == 0).await;
        assert_eq!(server.members(), vec![alice()]);
    }

    #[tokio::test]
    async fn test_silent_peer_is_dropped_after_timeout() {
        let mut config = test_config();
        config.receive_timeout = Duration::from_millis(200);
        let server = Server::start(config).await.unwrap();

        let mut stream = TcpStream::connect(server.addr()).await.unwrap();
        // Half a frame, then silence
        stream.write_all(&[6, b'c', b':']).await.unwrap();

        assert_closed(&mut stream).await;
        wait_until(|| server.connection_count() == 0).await;
    }

    #[tokio::test]
    async fn test_stop_closes_connections() {
        let server = Server::start(test_config()).await.unwrap();
        let mut stream = TcpStream::connect(server.addr()).await.unwrap();

        let bob = Member::new("Bob", "def", "v2", MemberKind::Guest);
        send(&mut stream, request::PLAYER_PING, &bob.to_bytes().unwrap()).await;
        recv(&mut stream).await.unwrap();

        server.stop();
        assert_closed(&mut stream).await;
        wait_until(|| server.connection_count() == 0).await;
        assert_eq!(server.members(), vec![alice()]);
    }

    #[tokio::test]
    async fn test_create_room_launches_mesh() {
        let server = Server::start(test_config()).await.unwrap();
        let mesh = FakeMesh::default();

        server.create_room(&mesh).await.unwrap();

        let port = server.addr().port();
        let launches = mesh.launches();
        assert_eq!(launches.len(), 1);
        let args = &launches[0];
        assert!(args.contains(&"scaffolding-mc-xxxxxxxxx".to_string()));
        assert!(args.contains(&format!("scaffolding-mc-server-{port}")));
        assert!(args.contains(&format!("--tcp-whitelist={port}")));
        assert!(args.contains(&"--tcp-whitelist=25565".to_string()));
    }

    #[tokio::test]
    async fn test_create_room_rejects_bad_code() {
        let mut config = test_config();
        config.room_code = "nope".into();
        let server = Server::start(config).await.unwrap();
        let mesh = FakeMesh::default();

        let err = server.create_room(&mesh).await.unwrap_err();
        assert!(matches!(err, Error::RoomCode(_)));
        assert!(mesh.launches().is_empty());
    }

    #[tokio::test]
    async fn test_create_room_after_stop() {
        let server = Server::start(test_config()).await.unwrap();
        server.stop();

        let err = server.create_room(&FakeMesh::default()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::InvalidConnectionState(_))
        ));
    }
}
