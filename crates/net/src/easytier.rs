//! EasyTier mesh process control
//!
//! `easytier-core` runs the virtual network; `easytier-cli --output json`
//! is used for peer listing and port forwarding.

use std::path::PathBuf;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::MeshError;
use crate::mesh::{MeshNetwork, Peer};

/// Paths to the EasyTier binaries and optional core log file
#[derive(Debug)]
pub struct EasyTier {
    core_path: PathBuf,
    cli_path: PathBuf,
    log_path: Option<PathBuf>,
    process: Mutex<Option<Child>>,
}

impl EasyTier {
    pub fn new(core_path: PathBuf, cli_path: PathBuf, log_path: Option<PathBuf>) -> Self {
        Self {
            core_path,
            cli_path,
            log_path,
            process: Mutex::new(None),
        }
    }

    /// Stdio for the core process: a fresh log file, or discarded
    fn core_output(&self) -> Result<(Stdio, Stdio), MeshError> {
        match &self.log_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(MeshError::Launch)?;
                }
                let file = std::fs::File::create(path).map_err(MeshError::Launch)?;
                let stderr = file.try_clone().map_err(MeshError::Launch)?;
                Ok((Stdio::from(file), Stdio::from(stderr)))
            }
            None => Ok((Stdio::null(), Stdio::null())),
        }
    }

    /// Run the CLI in JSON mode. Returns `None` when stdout is not JSON.
    async fn call_cli(&self, args: &[&str]) -> Result<Option<serde_json::Value>, MeshError> {
        debug!(args = ?args, "Calling easytier-cli");
        let output = Command::new(&self.cli_path)
            .args(["--output", "json"])
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(MeshError::Launch)?;

        if !output.stderr.is_empty() {
            return Err(MeshError::Cli(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(serde_json::from_slice(&output.stdout).ok())
    }
}

impl MeshNetwork for EasyTier {
    async fn launch(&self, args: &[String]) -> Result<(), MeshError> {
        self.kill().await;
        info!(args = ?args, "Launching easytier-core");

        let (stdout, stderr) = self.core_output()?;
        let child = Command::new(&self.core_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(MeshError::Launch)?;

        *self.process.lock().await = Some(child);
        Ok(())
    }

    async fn kill(&self) {
        if let Some(mut child) = self.process.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill easytier-core");
            } else {
                debug!("easytier-core stopped");
            }
        }
    }

    async fn list_peers(&self) -> Result<Vec<Peer>, MeshError> {
        let value = self
            .call_cli(&["peer", "list"])
            .await?
            .ok_or_else(|| MeshError::Parse("peer list is not JSON".into()))?;
        parse_peer_list(value)
    }

    async fn add_port_forward(&self, bind: &str, destination: &str) -> Result<(), MeshError> {
        self.call_cli(&["port-forward", "add", "tcp", bind, destination])
            .await?;
        info!(bind = %bind, destination = %destination, "Port forward added");
        Ok(())
    }

    async fn remove_port_forward(&self, bind: &str) -> Result<(), MeshError> {
        self.call_cli(&["port-forward", "remove", "tcp", bind]).await?;
        debug!(bind = %bind, "Port forward removed");
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawPeer {
    #[serde(default)]
    ipv4: String,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    tunnel_proto: String,
}

/// Decode `peer list` output. Addresses lose any `/prefix` suffix.
fn parse_peer_list(value: serde_json::Value) -> Result<Vec<Peer>, MeshError> {
    let raw: Vec<RawPeer> =
        serde_json::from_value(value).map_err(|e| MeshError::Parse(e.to_string()))?;

    Ok(raw
        .into_iter()
        .map(|p| Peer {
            ipv4: p.ipv4.split('/').next().unwrap_or_default().to_string(),
            hostname: p.hostname,
            tunnel_protocols: p
                .tunnel_proto
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_peer_list() {
        let value = serde_json::json!([
            {
                "ipv4": "10.126.126.1/24",
                "hostname": "scaffolding-mc-server-13452",
                "tunnel_proto": "tcp,udp"
            },
            { "hostname": "local", "tunnel_proto": "" }
        ]);

        let peers = parse_peer_list(value).unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].ipv4, "10.126.126.1");
        assert_eq!(peers[0].hostname, "scaffolding-mc-server-13452");
        assert_eq!(peers[0].tunnel_protocols, vec!["tcp", "udp"]);
        assert_eq!(peers[1].ipv4, "");
        assert!(peers[1].tunnel_protocols.is_empty());
    }

    #[test]
    fn test_parse_peer_list_rejects_non_array() {
        let result = parse_peer_list(serde_json::json!({ "error": "daemon not running" }));
        assert!(matches!(result, Err(MeshError::Parse(_))));
    }

    #[tokio::test]
    async fn test_missing_cli_is_launch_error() {
        let mesh = EasyTier::new(
            PathBuf::from("/nonexistent/easytier-core"),
            PathBuf::from("/nonexistent/easytier-cli"),
            None,
        );

        assert!(matches!(mesh.list_peers().await, Err(MeshError::Launch(_))));
        assert!(matches!(
            mesh.launch(&["--no-tun".to_string()]).await,
            Err(MeshError::Launch(_))
        ));
        // Killing with nothing running is a no-op
        mesh.kill().await;
    }
}
