//! TCP client for joining a room
//!
//! A client holds one connection and issues one request at a time: write a
//! request frame, wait for exactly one response frame. After connecting, the
//! caller must call [`Client::heartbeat`] every [`HEARTBEAT_INTERVAL`] to
//! stay in the room and keep the mirrored roster fresh.

use std::sync::Arc;
use std::time::Duration;

use scaffolding_core::{Member, Room, RoomCode};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bounded::{bounded, BoundedReader, RECEIVE_TIMEOUT};
use crate::buffer::ByteBuffer;
use crate::discovery::{discover_server, RetryPolicy};
use crate::error::{ConnectionError, Error, ProtocolError, Result};
use crate::frame::{read_response, write_frame, Request, Response};
use crate::lifecycle::{ConnectionState, Lifecycle};
use crate::mesh::{MeshNetwork, DEFAULT_RELAY};
use crate::protocol::{request, PROTOCOL_SEPARATOR};

/// Cadence at which callers must send heartbeats
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    /// Deadline for each read from the server
    pub receive_timeout: Duration,
    /// Polling policy used to find the host on the mesh
    pub discovery: RetryPolicy,
    pub relay: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: RECEIVE_TIMEOUT,
            receive_timeout: RECEIVE_TIMEOUT,
            discovery: RetryPolicy::default(),
            relay: DEFAULT_RELAY.to_string(),
        }
    }
}

struct Transport {
    reader: BoundedReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Client handle for a joined room
pub struct Client {
    player: Member,
    room: Arc<Room>,
    lifecycle: Lifecycle,
    cancel: CancellationToken,
    receive_timeout: Duration,
    /// Held for a whole exchange, so at most one request is in flight
    transport: Mutex<Option<Transport>>,
}

impl Client {
    /// Find the room's host on the mesh and connect to it.
    ///
    /// Launches the mesh for `room_code`, waits for the host advertisement,
    /// forwards its listener and game-server ports to loopback, and connects.
    pub async fn join<M: MeshNetwork>(
        mesh: &M,
        room_code: &str,
        player: Member,
        config: &ClientConfig,
    ) -> Result<Self> {
        let code = RoomCode::parse(room_code)?;
        mesh.launch(&guest_mesh_args(&code, &config.relay)).await?;

        let server = discover_server(mesh, &config.discovery).await?;
        mesh.add_port_forward(
            &format!("127.0.0.1:{}", server.port),
            &format!("{}:{}", server.ipv4, server.port),
        )
        .await?;

        let client = Self::connect("127.0.0.1", server.port, player, config).await?;

        let game_port = client.room.server_port();
        mesh.add_port_forward(
            &format!("127.0.0.1:{game_port}"),
            &format!("{}:{game_port}", server.ipv4),
        )
        .await?;
        info!(addr = %format!("127.0.0.1:{game_port}"), "Game server ready");

        Ok(client)
    }

    /// Connect to a Scaffolding server, announce `player` and learn the
    /// game-server port
    pub async fn connect(
        host: &str,
        port: u16,
        player: Member,
        config: &ClientConfig,
    ) -> Result<Self> {
        if port == 0 {
            return Err(ConnectionError::InvalidPort(port.to_string()).into());
        }

        info!(host = %host, port, "Connecting to scaffolding server");
        let lifecycle = Lifecycle::new();
        let cancel = CancellationToken::new();

        let stream = tokio::select! {
            biased;
            result = dial(host, port, &lifecycle) => result?,
            Err(e) = lifecycle.wait_ready(config.connect_timeout) => {
                lifecycle.fail();
                return Err(e.into());
            }
        };

        let (reader, writer) = stream.into_split();
        let client = Client {
            player,
            room: Arc::new(Room::mirror()),
            lifecycle,
            receive_timeout: config.receive_timeout,
            transport: Mutex::new(Some(Transport {
                reader: BoundedReader::new(reader, config.receive_timeout, cancel.clone()),
                writer,
            })),
            cancel,
        };
        info!("Connected to scaffolding server");

        client.heartbeat().await?;
        let server_port = client.fetch_server_port().await?;
        client.room.set_server_port(server_port);

        Ok(client)
    }

    /// Send one request and wait for its response.
    ///
    /// `body` fills the request body. Nonzero statuses are returned as-is.
    pub async fn send_request<F>(&self, request_type: &str, body: F) -> Result<Response>
    where
        F: FnOnce(&mut ByteBuffer) -> Result<()>,
    {
        let mut buf = ByteBuffer::new();
        body(&mut buf)?;
        let frame = Request::new(request_type, buf.freeze()).encode()?;

        let mut guard = self.transport.lock().await;
        self.assert_ready()?;
        let transport = guard.as_mut().ok_or(ConnectionError::MissingConnection)?;

        debug!(request = %request_type, "Sending request");
        let result = async {
            bounded(
                write_frame(&mut transport.writer, &frame),
                self.receive_timeout,
                &self.cancel,
            )
            .await?;
            read_response(&mut transport.reader).await
        }
        .await;

        if let Err(e) = &result {
            // The stream may be mid-frame; it cannot carry another exchange
            if self.lifecycle.fail() {
                warn!(request = %request_type, error = %e, "Connection failed");
            }
            *guard = None;
        }
        result
    }

    /// Announce this player and refresh the mirrored member list
    pub async fn heartbeat(&self) -> Result<()> {
        let announce = self.player.to_bytes()?;
        let response = self
            .send_request(request::PLAYER_PING, |buf| {
                buf.write_bytes(&announce);
                Ok(())
            })
            .await?;
        ensure_success(request::PLAYER_PING, &response)?;

        let response = self
            .send_request(request::PLAYER_PROFILES_LIST, |_| Ok(()))
            .await?;
        ensure_success(request::PLAYER_PROFILES_LIST, &response)?;

        let members = Member::list_from_bytes(&response.body)?;
        self.room.replace_members(members);
        Ok(())
    }

    /// Request types the server supports
    pub async fn protocols(&self) -> Result<Vec<String>> {
        let response = self.send_request(request::PROTOCOLS, |_| Ok(())).await?;
        ensure_success(request::PROTOCOLS, &response)?;

        let text = String::from_utf8(response.body.to_vec())
            .map_err(|_| ProtocolError::Malformed("protocol list is not UTF-8".into()))?;
        Ok(text
            .split(PROTOCOL_SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn fetch_server_port(&self) -> Result<u16> {
        let response = self.send_request(request::SERVER_PORT, |_| Ok(())).await?;
        ensure_success(request::SERVER_PORT, &response)?;

        let port = response.reader().read_u16()?;
        if port == 0 {
            return Err(ConnectionError::InvalidPort(port.to_string()).into());
        }
        Ok(port)
    }

    /// Leave the room and close the connection.
    ///
    /// Pending reads are unblocked and report `ConnectionError::Cancelled`.
    pub async fn stop(&self) -> Result<()> {
        // Cancelled must be recorded before any pending read can wake and fail
        let stopped = self.lifecycle.cancel();
        self.cancel.cancel();

        let transport = self.transport.lock().await.take();
        match transport {
            Some(transport) => {
                let mut writer = transport.writer;
                if let Err(e) = writer.shutdown().await {
                    debug!(error = %e, "Shutdown after stop failed");
                }
            }
            // A request interrupted by this stop already dropped the stream
            None if stopped => {}
            None => return Err(ConnectionError::MissingConnection.into()),
        }
        info!("Disconnected from scaffolding server");
        Ok(())
    }

    /// Mirrored room state
    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    pub fn members(&self) -> Vec<Member> {
        self.room.members()
    }

    pub fn player(&self) -> &Member {
        &self.player
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    fn assert_ready(&self) -> std::result::Result<(), ConnectionError> {
        match self.lifecycle.state() {
            ConnectionState::Ready => Ok(()),
            state => Err(ConnectionError::InvalidConnectionState(state)),
        }
    }
}

/// Open the transport, moving `lifecycle` out of `Connecting`
async fn dial(host: &str, port: u16, lifecycle: &Lifecycle) -> Result<TcpStream> {
    let result = async {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok::<_, std::io::Error>(stream)
    }
    .await;

    match result {
        Ok(stream) => {
            lifecycle.mark_ready();
            Ok(stream)
        }
        Err(e) => {
            lifecycle.fail();
            Err(e.into())
        }
    }
}

fn ensure_success(request_type: &str, response: &Response) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    Err(Error::Protocol(ProtocolError::RequestFailed {
        request: request_type.to_string(),
        status: response.status,
    }))
}

/// `easytier-core` arguments for joining `code`
fn guest_mesh_args(code: &RoomCode, relay: &str) -> Vec<String> {
    vec![
        "--no-tun".into(),
        "-d".into(),
        "--network-name".into(),
        code.network_name(),
        "--network-secret".into(),
        code.network_secret(),
        "-p".into(),
        relay.to_string(),
        "--tcp-whitelist=0".into(),
    ]
}
