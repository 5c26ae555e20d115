//! Application configuration
//!
//! Loaded from `config.toml` in the platform config directory. Every field
//! is optional; a missing file yields the defaults.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Name shown to other players
    pub player_name: String,
    /// Launcher/client information sent with the player profile
    pub vendor: String,
    /// Overrides the detected machine id
    pub machine_id: Option<String>,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
    pub easytier: EasyTierConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            player_name: "Player".to_string(),
            vendor: format!("Scaffolding {}", env!("CARGO_PKG_VERSION")),
            machine_id: None,
            log_filter: "info".to_string(),
            easytier: EasyTierConfig::default(),
        }
    }
}

/// `[easytier]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EasyTierConfig {
    pub core_path: PathBuf,
    pub cli_path: PathBuf,
    /// Where `easytier-core` output goes; discarded when unset
    pub log_path: Option<PathBuf>,
    pub relay: String,
}

impl Default for EasyTierConfig {
    fn default() -> Self {
        Self {
            core_path: PathBuf::from("easytier-core"),
            cli_path: PathBuf::from("easytier-cli"),
            log_path: None,
            relay: scaffolding_net::mesh::DEFAULT_RELAY.to_string(),
        }
    }
}

impl AppConfig {
    /// Platform location of `config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "scaffolding", "scaffolding")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path`, falling back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Configured machine id, or the detected one
    pub fn machine_id(&self) -> String {
        match &self.machine_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => scaffolding_core::machine_id(),
        }
    }
}
