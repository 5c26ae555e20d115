//! Network management for the app
//!
//! Drives a hosted room or a joined room until Ctrl-C or failure.

use scaffolding_core::{Member, MemberKind, RoomCode};
use scaffolding_net::{
    Client, ClientConfig, ConnectionError, EasyTier, MeshNetwork, Server, ServerConfig,
    HEARTBEAT_INTERVAL,
};
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::error::AppError;

/// Build the mesh collaborator from config
fn easytier(config: &AppConfig) -> EasyTier {
    EasyTier::new(
        config.easytier.core_path.clone(),
        config.easytier.cli_path.clone(),
        config.easytier.log_path.clone(),
    )
}

fn player(config: &AppConfig, name: Option<String>, kind: MemberKind) -> Member {
    Member::new(
        name.unwrap_or_else(|| config.player_name.clone()),
        config.machine_id(),
        config.vendor.clone(),
        kind,
    )
}

/// Host a room for the game server on `server_port`
pub async fn host(
    config: &AppConfig,
    room_code: Option<String>,
    server_port: u16,
    listen_port: u16,
    name: Option<String>,
) -> Result<(), AppError> {
    let code = match room_code {
        Some(code) => RoomCode::parse(&code)?,
        None => RoomCode::generate(),
    };

    let mut server_config = ServerConfig::new(
        code.as_str(),
        player(config, name, MemberKind::Host),
        server_port,
    );
    server_config.listen_addr.set_port(listen_port);
    server_config.relay = config.easytier.relay.clone();

    let server = Server::start(server_config).await?;
    let mesh = easytier(config);
    if let Err(e) = server.create_room(&mesh).await {
        server.stop();
        mesh.kill().await;
        return Err(e.into());
    }
    println!("{code}");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
    let mut roster = server.members();

    let result = loop {
        tokio::select! {
            signal = &mut shutdown => break signal.map_err(AppError::from),
            _ = ticker.tick() => {
                let members = server.members();
                log_roster_changes(&roster, &members);
                roster = members;
            }
        }
    };

    info!("Closing room");
    server.stop();
    mesh.kill().await;
    result
}

/// Join the room `room_code` and heartbeat until stopped
pub async fn join(config: &AppConfig, room_code: &str, name: Option<String>) -> Result<(), AppError> {
    let client_config = ClientConfig {
        relay: config.easytier.relay.clone(),
        ..ClientConfig::default()
    };
    let mesh = easytier(config);

    let client = match Client::join(
        &mesh,
        room_code,
        player(config, name, MemberKind::Guest),
        &client_config,
    )
    .await
    {
        Ok(client) => client,
        Err(e) => {
            mesh.kill().await;
            return Err(e.into());
        }
    };
    println!("127.0.0.1:{}", client.room().server_port());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
    let mut roster = client.members();

    let result = loop {
        tokio::select! {
            signal = &mut shutdown => break signal.map_err(AppError::from),
            state = client.lifecycle().closed() => {
                error!(state = ?state, "Connection closed");
                break Err(scaffolding_net::Error::from(
                    ConnectionError::InvalidConnectionState(state),
                )
                .into());
            }
            _ = ticker.tick() => {
                if let Err(e) = client.heartbeat().await {
                    error!(error = %e, "Heartbeat failed");
                    break Err(e.into());
                }
                let members = client.members();
                log_roster_changes(&roster, &members);
                roster = members;
            }
        }
    };

    info!("Leaving room");
    if let Err(e) = client.stop().await {
        debug!(error = %e, "Client already closed");
    }
    mesh.kill().await;
    result
}

/// Members present in `after` but not `before`, and the reverse
fn roster_changes<'a>(
    before: &'a [Member],
    after: &'a [Member],
) -> (Vec<&'a Member>, Vec<&'a Member>) {
    let in_list =
        |list: &[Member], m: &Member| list.iter().any(|other| other.machine_id == m.machine_id);
    let joined = after.iter().filter(|m| !in_list(before, *m)).collect();
    let left = before.iter().filter(|m| !in_list(after, *m)).collect();
    (joined, left)
}

fn log_roster_changes(before: &[Member], after: &[Member]) {
    let (joined, left) = roster_changes(before, after);
    for member in joined {
        info!(name = %member.name, vendor = %member.vendor, "Player joined");
    }
    for member in left {
        info!(name = %member.name, "Player left");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, machine_id: &str) -> Member {
        Member::new(name, machine_id, "v1", MemberKind::Guest)
    }

    #[test]
    fn test_roster_changes() {
        let before = vec![member("Alice", "a"), member("Bob", "b")];
        let after = vec![member("Alice", "a"), member("Carol", "c")];

        let (joined, left) = roster_changes(&before, &after);
        assert_eq!(joined, vec![&after[1]]);
        assert_eq!(left, vec![&before[1]]);
    }

    #[test]
    fn test_roster_unchanged() {
        let roster = vec![member("Alice", "a")];
        let (joined, left) = roster_changes(&roster, &roster);
        assert!(joined.is_empty());
        assert!(left.is_empty());
    }

    #[test]
    fn test_player_uses_config_defaults() {
        let config = AppConfig {
            machine_id: Some("abc".to_string()),
            ..AppConfig::default()
        };

        let host = player(&config, None, MemberKind::Host);
        assert_eq!(host.name, "Player");
        assert_eq!(host.machine_id, "abc");
        assert!(host.is_host());

        let guest = player(&config, Some("Bob".to_string()), MemberKind::Guest);
        assert_eq!(guest.name, "Bob");
        assert!(!guest.is_host());
    }

    #[tokio::test]
    async fn test_host_rejects_bad_room_code() {
        let result = host(&AppConfig::default(), Some("bad".to_string()), 25565, 0, None).await;
        assert!(matches!(result, Err(AppError::RoomCode(_))));
    }
}
