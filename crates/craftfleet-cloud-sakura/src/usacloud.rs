//! usacloud CLI wrapper
//!
//! Wraps the usacloud CLI commands for Sakura Cloud operations. Create and
//! update calls pass their input with `--parameters` as JSON.

use crate::error::{Result, SakuraError};
use serde::{Deserialize, Deserializer, Serialize};
use std::process::Stdio;
use tokio::process::Command;

/// usacloud CLI wrapper bound to one zone
#[derive(Debug, Clone)]
pub struct Usacloud {
    zone: String,
}

impl Usacloud {
    pub fn new(zone: impl Into<String>) -> Self {
        Self { zone: zone.into() }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Check if usacloud is installed and authenticated
    pub async fn check_auth(&self) -> Result<UsacloudAuth> {
        let which = Command::new("which").arg("usacloud").output().await?;
        if !which.status.success() {
            return Err(SakuraError::UsacloudNotFound);
        }

        let output = self
            .run_command(&["auth-status", "--output-type", "json"])
            .await?;
        Ok(serde_json::from_str(&output)?)
    }

    /// Run a usacloud command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("usacloud");
        cmd.arg("--zone").arg(&self.zone);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: usacloud --zone {} {}", self.zone, args.join(" "));

        let output = cmd.output().await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SakuraError::UsacloudNotFound,
            _ => SakuraError::IoError(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SakuraError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(&self, args: &[&str]) -> Result<T> {
        let output = self.run_command(args).await?;
        Ok(serde_json::from_str(&first_object(&output))?)
    }

    async fn create_json<T, P>(&self, resource: &str, parameters: &P) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
        P: Serialize,
    {
        let parameters = serde_json::to_string(parameters)?;
        self.read_json(&[
            resource,
            "create",
            "--parameters",
            &parameters,
            "--output-type",
            "json",
            "--yes",
        ])
        .await
    }

    async fn delete(&self, resource: &str, id: &str, extra: &[&str]) -> Result<()> {
        let mut args = vec![resource, "delete", id, "--yes"];
        args.extend_from_slice(extra);
        self.run_command(&args).await?;
        Ok(())
    }

    // --- servers ---

    /// List all servers in the zone
    pub async fn list_servers(&self) -> Result<Vec<ServerInfo>> {
        let output = self
            .run_command(&["server", "list", "--output-type", "json"])
            .await?;

        if output.trim().is_empty() || output.trim() == "[]" {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&output)?)
    }

    /// Get server by ID
    pub async fn get_server_by_id(&self, id: &str) -> Result<ServerInfo> {
        self.read_json(&["server", "read", id, "--output-type", "json"])
            .await
    }

    pub async fn create_server(&self, parameters: &CreateServerParameters) -> Result<ServerInfo> {
        self.create_json("server", parameters).await
    }

    /// Delete a server; attached disks survive unless `with_disks` is set
    pub async fn delete_server(&self, id: &str, with_disks: bool) -> Result<()> {
        if with_disks {
            self.delete("server", id, &["--force", "--with-disks"]).await
        } else {
            self.delete("server", id, &["--force"]).await
        }
    }

    // --- ssh keys ---

    pub async fn get_ssh_key(&self, id: &str) -> Result<SshKeyInfo> {
        self.read_json(&["ssh-key", "read", id, "--output-type", "json"])
            .await
    }

    /// Create SSH key
    pub async fn create_ssh_key(&self, name: &str, public_key: &str) -> Result<SshKeyInfo> {
        self.read_json(&[
            "ssh-key",
            "create",
            "--name",
            name,
            "--public-key",
            public_key,
            "--output-type",
            "json",
        ])
        .await
    }

    pub async fn delete_ssh_key(&self, id: &str) -> Result<()> {
        self.delete("ssh-key", id, &[]).await
    }

    // --- packet filters ---

    pub async fn get_packet_filter(&self, id: &str) -> Result<PacketFilterInfo> {
        self.read_json(&["packet-filter", "read", id, "--output-type", "json"])
            .await
    }

    pub async fn create_packet_filter(
        &self,
        name: &str,
        expression: Vec<PacketFilterExpression>,
    ) -> Result<PacketFilterInfo> {
        let parameters = PacketFilterParameters {
            name: Some(name.to_string()),
            expression,
        };
        self.create_json("packet-filter", &parameters).await
    }

    /// Replace the rule list of an existing packet filter
    pub async fn update_packet_filter(
        &self,
        id: &str,
        expression: Vec<PacketFilterExpression>,
    ) -> Result<PacketFilterInfo> {
        let parameters = serde_json::to_string(&PacketFilterParameters {
            name: None,
            expression,
        })?;
        self.read_json(&[
            "packet-filter",
            "update",
            id,
            "--parameters",
            &parameters,
            "--output-type",
            "json",
            "--yes",
        ])
        .await
    }

    pub async fn delete_packet_filter(&self, id: &str) -> Result<()> {
        self.delete("packet-filter", id, &[]).await
    }

    // --- disks ---

    pub async fn get_disk(&self, id: &str) -> Result<DiskInfo> {
        self.read_json(&["disk", "read", id, "--output-type", "json"])
            .await
    }

    pub async fn create_disk(&self, name: &str, size_gb: u32) -> Result<DiskInfo> {
        let parameters = CreateDiskParameters {
            name: name.to_string(),
            size_gb,
            disk_plan: "ssd".to_string(),
        };
        self.create_json("disk", &parameters).await
    }

    pub async fn delete_disk(&self, id: &str) -> Result<()> {
        self.delete("disk", id, &[]).await
    }
}

/// usacloud prints single objects as a one-element array for some commands
fn first_object(output: &str) -> String {
    match serde_json::from_str::<Vec<serde_json::Value>>(output) {
        Ok(mut items) if items.len() == 1 => items.remove(0).to_string(),
        _ => output.to_string(),
    }
}

/// Sakura IDs are 12-digit numbers; usacloud emits them as strings or numbers
fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Authentication status from usacloud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsacloudAuth {
    #[serde(rename = "Account")]
    pub account: Option<AccountInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(rename = "ID", deserialize_with = "de_id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// Server information from usacloud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(rename = "ID", deserialize_with = "de_id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "CPU")]
    pub cpu: Option<i32>,

    #[serde(rename = "MemoryMB")]
    pub memory_mb: Option<i32>,

    #[serde(rename = "InstanceStatus")]
    pub instance_status: Option<String>,

    #[serde(rename = "Availability")]
    pub availability: Option<String>,

    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,

    #[serde(rename = "Interfaces")]
    pub interfaces: Option<Vec<InterfaceInfo>>,

    #[serde(rename = "Disks", default)]
    pub disks: Vec<DiskRef>,
}

impl ServerInfo {
    /// Get the first IP address
    pub fn ip_address(&self) -> Option<String> {
        self.interfaces
            .as_ref()?
            .iter()
            .find_map(|i| i.ip_address.clone())
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.instance_status.as_deref() == Some("up")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceInfo {
    #[serde(rename = "IPAddress")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskRef {
    #[serde(rename = "ID", deserialize_with = "de_id")]
    pub id: String,
}

/// Disk information from usacloud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskInfo {
    #[serde(rename = "ID", deserialize_with = "de_id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "SizeMB")]
    pub size_mb: Option<u64>,

    #[serde(rename = "Availability")]
    pub availability: Option<String>,
}

/// SSH key information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeyInfo {
    #[serde(rename = "ID", deserialize_with = "de_id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "PublicKey")]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketFilterInfo {
    #[serde(rename = "ID", deserialize_with = "de_id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Expression", default)]
    pub expression: Vec<PacketFilterExpression>,
}

/// One packet filter rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PacketFilterExpression {
    pub protocol: String,
    #[serde(default)]
    pub source_network: String,
    #[serde(default)]
    pub destination_port: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PacketFilterParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    expression: Vec<PacketFilterExpression>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateDiskParameters {
    name: String,
    #[serde(rename = "SizeGB")]
    size_gb: u32,
    disk_plan: String,
}

/// Input of `usacloud server create`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateServerParameters {
    pub name: String,
    #[serde(rename = "CPU")]
    pub cpu: u32,
    #[serde(rename = "MemoryGB")]
    pub memory_gb: u32,
    pub tags: Vec<String>,
    pub network_interface_driver: String,
    pub network_interfaces: Vec<NetworkInterfaceParameters>,
    pub disks: Vec<DiskParameters>,
    /// Existing disks connected after the boot disk
    #[serde(rename = "DiskIDs", skip_serializing_if = "Vec::is_empty")]
    pub disk_ids: Vec<String>,
    pub user_data: String,
    pub boot_after_create: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkInterfaceParameters {
    pub upstream: String,
    #[serde(rename = "PacketFilterID", skip_serializing_if = "Option::is_none")]
    pub packet_filter_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskParameters {
    pub name: String,
    #[serde(rename = "OSType")]
    pub os_type: String,
    #[serde(rename = "SizeGB")]
    pub size_gb: u32,
    pub edit_parameter: DiskEditParameters,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskEditParameters {
    pub host_name: String,
    #[serde(rename = "SSHKeyIDs")]
    pub ssh_key_ids: Vec<String>,
    pub disable_pw_auth: bool,
}
