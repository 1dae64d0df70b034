//! Server specification
//!
//! Immutable description of one game server: workload, placement, network
//! exposure, storage and execution flags. Built once from a manifest and
//! only read afterwards.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Transport protocol of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Server software edition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    Java,
    Paper,
    Spigot,
    Fabric,
    Forge,
    Bungeecord,
    Waterfall,
    Velocity,
    Bedrock,
    Nukkit,
    Powernukkit,
}

impl Edition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edition::Java => "java",
            Edition::Paper => "paper",
            Edition::Spigot => "spigot",
            Edition::Fabric => "fabric",
            Edition::Forge => "forge",
            Edition::Bungeecord => "bungeecord",
            Edition::Waterfall => "waterfall",
            Edition::Velocity => "velocity",
            Edition::Bedrock => "bedrock",
            Edition::Nukkit => "nukkit",
            Edition::Powernukkit => "powernukkit",
        }
    }

    /// Broadcast-style editions speak the Bedrock protocol over UDP
    pub fn protocol(&self) -> Protocol {
        match self {
            Edition::Bedrock | Edition::Nukkit | Edition::Powernukkit => Protocol::Udp,
            _ => Protocol::Tcp,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self.protocol() {
            Protocol::Udp => 19132,
            Protocol::Tcp => 25565,
        }
    }

    /// Proxy editions front other servers and host no world
    pub fn is_proxy(&self) -> bool {
        matches!(
            self,
            Edition::Bungeecord | Edition::Waterfall | Edition::Velocity
        )
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SSH access to the instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshSpec {
    pub public_key_file: PathBuf,

    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default = "default_ssh_user")]
    pub user: String,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_user() -> String {
    "root".to_string()
}

/// Remote administration (RCON) settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RconSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_rcon_port")]
    pub port: u16,

    #[serde(default)]
    pub password: Option<String>,

    /// Echo RCON commands to operators in game
    #[serde(default)]
    pub broadcast: bool,
}

fn default_rcon_port() -> u16 {
    25575
}

impl Default for RconSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_rcon_port(),
            password: None,
            broadcast: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for MonitoringSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub size_gb: u32,
}

/// Full description of one game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub name: String,

    pub edition: Edition,

    /// Workload version, e.g. "1.20.4"
    #[serde(default)]
    pub version: Option<String>,

    /// Provider code used to select the adapter (e.g. "sakura")
    pub provider: String,

    pub region: String,

    /// Provider-specific instance size/class
    pub size: String,

    /// Primary game port; defaults to the edition's standard port
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub spot: bool,

    #[serde(default)]
    pub volume: Option<VolumeSpec>,

    pub ssh: SshSpec,

    #[serde(default)]
    pub rcon: RconSpec,

    #[serde(default)]
    pub monitoring: MonitoringSpec,
}

impl ServerSpec {
    pub fn game_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.edition.default_port())
    }

    pub fn protocol(&self) -> Protocol {
        self.edition.protocol()
    }

    /// Basic sanity checks before any provider is contacted
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CloudError::InvalidSpec("name must not be empty".to_string()));
        }
        if self.provider.trim().is_empty() {
            return Err(CloudError::InvalidSpec(
                "provider must not be empty".to_string(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(CloudError::InvalidSpec("region must not be empty".to_string()));
        }
        if self.game_port() == 0 || self.ssh.port == 0 {
            return Err(CloudError::InvalidSpec("ports must be non-zero".to_string()));
        }
        if self.rcon.enabled && self.rcon.port == 0 {
            return Err(CloudError::InvalidSpec("rcon port must be non-zero".to_string()));
        }
        if self.monitoring.enabled && self.monitoring.port == 0 {
            return Err(CloudError::InvalidSpec(
                "metrics port must be non-zero".to_string(),
            ));
        }
        if matches!(&self.volume, Some(v) if v.size_gb == 0) {
            return Err(CloudError::InvalidSpec(
                "volume size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
