//! Protocol constants shared by host and client

/// Fixed local port of the Scaffolding service
pub const DEFAULT_PORT: u16 = 13452;

/// Hostname prefix a host advertises on the mesh, followed by its listener port
pub const SERVER_HOSTNAME_PREFIX: &str = "scaffolding-mc-server-";

/// Core request types. The `c:` prefix namespaces the core protocol.
pub mod request {
    /// Echo the body back
    pub const PING: &str = "c:ping";
    /// NUL-separated list of supported request types
    pub const PROTOCOLS: &str = "c:protocols";
    /// Game-server port as a big-endian u16
    pub const SERVER_PORT: &str = "c:server_port";
    /// Announce the sender's member profile
    pub const PLAYER_PING: &str = "c:player_ping";
    /// JSON array of the current room members
    pub const PLAYER_PROFILES_LIST: &str = "c:player_profiles_list";
}

/// Separator used in the `c:protocols` response body
pub const PROTOCOL_SEPARATOR: &str = "\0";

/// Hostname a host advertises for a listener on `port`
pub fn server_hostname(port: u16) -> String {
    format!("{SERVER_HOSTNAME_PREFIX}{port}")
}
