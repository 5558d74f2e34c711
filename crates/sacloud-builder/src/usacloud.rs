//! usacloud CLI wrapper
//!
//! Wraps the usacloud CLI commands for the disk and server operations the
//! builders need, and maps their JSON output onto resource types.

use crate::api::{CreateDiskRequest, CreateServerRequest, DiskApi, DiskEdit, ServerApi};
use crate::error::{Result, SakuraError};
use async_trait::async_trait;
use sacloud_setup::{Availability, Identifiable, Resource, ResourceId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

/// Zones accepted by the API
pub const ZONES: &[&str] = &["is1a", "is1b", "tk1a", "tk1b", "tk1v"];

pub fn validate_zone(zone: &str) -> Result<()> {
    if ZONES.contains(&zone) {
        Ok(())
    } else {
        Err(SakuraError::InvalidZone(zone.to_string()))
    }
}

/// usacloud CLI wrapper
#[derive(Debug, Clone)]
pub struct Usacloud {
    program: String,
}

impl Default for Usacloud {
    fn default() -> Self {
        Self::new()
    }
}

impl Usacloud {
    pub fn new() -> Self {
        Self {
            program: "usacloud".to_string(),
        }
    }

    /// Check if usacloud is installed
    pub async fn check_installed(&self) -> Result<()> {
        let which = Command::new("which").arg(&self.program).output().await?;

        if !which.status.success() {
            return Err(SakuraError::UsacloudNotFound);
        }
        Ok(())
    }

    /// Run a usacloud command in `zone` and return stdout
    async fn run_command(&self, zone: &str, args: &[&str]) -> Result<String> {
        validate_zone(zone)?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("--zone").arg(zone);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {} --zone {} {}", self.program, zone, args.join(" "));

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SakuraError::UsacloudNotFound
            } else {
                SakuraError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SakuraError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Parse a single object from usacloud output, which may wrap it in an array
fn parse_one<T: DeserializeOwned>(output: &str) -> Result<Option<T>> {
    let value: serde_json::Value = serde_json::from_str(output.trim())?;
    match value {
        serde_json::Value::Array(items) => match items.into_iter().next() {
            Some(item) => Ok(Some(serde_json::from_value(item)?)),
            None => Ok(None),
        },
        other => Ok(Some(serde_json::from_value(other)?)),
    }
}

fn is_not_found(err: &SakuraError) -> bool {
    match err {
        SakuraError::CommandFailed(msg) => {
            let msg = msg.to_ascii_lowercase();
            msg.contains("not found") || msg.contains("404")
        }
        _ => false,
    }
}

#[async_trait]
impl DiskApi for Usacloud {
    async fn create_disk(&self, zone: &str, req: &CreateDiskRequest) -> Result<DiskInfo> {
        let size_str = req.size_gb.to_string();
        let tags = req.tags.join(",");

        let mut args = vec![
            "disk",
            "create",
            "--name",
            req.name.as_str(),
            "--plan",
            req.plan.as_str(),
            "--size",
            size_str.as_str(),
            "--output-type",
            "json",
            "--yes",
        ];

        if let Some(ref archive) = req.source_archive_id {
            args.push("--source-archive-id");
            args.push(archive.as_str());
        }

        if let Some(ref disk) = req.source_disk_id {
            args.push("--source-disk-id");
            args.push(disk.as_str());
        }

        if !req.tags.is_empty() {
            args.push("--tags");
            args.push(tags.as_str());
        }

        let output = self.run_command(zone, &args).await?;
        parse_one(&output)?
            .ok_or_else(|| SakuraError::CommandFailed("disk create returned no disk".to_string()))
    }

    async fn read_disk(&self, zone: &str, id: &ResourceId) -> Result<DiskInfo> {
        let output = self
            .run_command(zone, &["disk", "read", id.as_str(), "--output-type", "json"])
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    SakuraError::DiskNotFound(id.to_string())
                } else {
                    e
                }
            })?;

        parse_one(&output)?.ok_or_else(|| SakuraError::DiskNotFound(id.to_string()))
    }

    async fn delete_disk(&self, zone: &str, id: &ResourceId) -> Result<()> {
        self.run_command(zone, &["disk", "delete", id.as_str(), "--yes"])
            .await?;
        Ok(())
    }

    async fn edit_disk(&self, zone: &str, id: &ResourceId, edit: &DiskEdit) -> Result<()> {
        let ssh_key_ids = edit.ssh_key_ids.join(",");
        let note_ids = edit.note_ids.join(",");

        let mut args = vec!["disk", "edit", id.as_str(), "--yes"];

        if let Some(ref hostname) = edit.hostname {
            args.push("--hostname");
            args.push(hostname.as_str());
        }

        if let Some(ref password) = edit.password {
            args.push("--password");
            args.push(password.as_str());
        }

        if !edit.ssh_key_ids.is_empty() {
            args.push("--ssh-key-ids");
            args.push(ssh_key_ids.as_str());
        }

        if !edit.note_ids.is_empty() {
            args.push("--note-ids");
            args.push(note_ids.as_str());
        }

        if edit.disable_password_auth {
            args.push("--disable-pw-auth");
        }

        self.run_command(zone, &args).await?;
        Ok(())
    }

    async fn connect_disk(
        &self,
        zone: &str,
        id: &ResourceId,
        server_id: &ResourceId,
    ) -> Result<()> {
        self.run_command(
            zone,
            &[
                "disk",
                "connect-to-server",
                id.as_str(),
                "--server-id",
                server_id.as_str(),
                "--yes",
            ],
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ServerApi for Usacloud {
    async fn create_server(&self, zone: &str, req: &CreateServerRequest) -> Result<ServerInfo> {
        let core_str = req.core.to_string();
        let memory_str = req.memory_gb.to_string();
        let tags = req.tags.join(",");

        let mut args = vec![
            "server",
            "create",
            "--name",
            req.name.as_str(),
            "--core",
            core_str.as_str(),
            "--memory",
            memory_str.as_str(),
            "--output-type",
            "json",
            "--yes",
        ];

        if !req.tags.is_empty() {
            args.push("--tags");
            args.push(tags.as_str());
        }

        let output = self.run_command(zone, &args).await?;
        parse_one(&output)?.ok_or_else(|| {
            SakuraError::CommandFailed("server create returned no server".to_string())
        })
    }

    async fn read_server(&self, zone: &str, id: &ResourceId) -> Result<ServerInfo> {
        let output = self
            .run_command(zone, &["server", "read", id.as_str(), "--output-type", "json"])
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    SakuraError::ServerNotFound(id.to_string())
                } else {
                    e
                }
            })?;

        parse_one(&output)?.ok_or_else(|| SakuraError::ServerNotFound(id.to_string()))
    }

    async fn delete_server(&self, zone: &str, id: &ResourceId, with_disks: bool) -> Result<()> {
        let mut args = vec!["server", "delete", id.as_str(), "--yes"];

        if with_disks {
            args.push("--with-disks");
        }

        self.run_command(zone, &args).await?;
        Ok(())
    }

    async fn power_on(&self, zone: &str, id: &ResourceId) -> Result<()> {
        self.run_command(zone, &["server", "power-on", id.as_str(), "--yes"])
            .await?;
        Ok(())
    }
}

/// Disk information from usacloud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskInfo {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Availability")]
    pub availability: Option<String>,

    #[serde(rename = "SizeMB")]
    pub size_mb: Option<u64>,

    #[serde(rename = "ServerID")]
    pub server_id: Option<String>,
}

impl Identifiable for DiskInfo {
    fn resource_id(&self) -> ResourceId {
        ResourceId::from(self.id.as_str())
    }
}

impl Resource for DiskInfo {
    fn availability(&self) -> Option<Availability> {
        Some(parse_availability(self.availability.as_deref()))
    }
}

/// Map the API's availability vocabulary
pub fn parse_availability(value: Option<&str>) -> Availability {
    match value {
        Some("available") => Availability::Ready,
        Some("failed") => Availability::Failed,
        // migrating, uploading, transferring, discontinued
        _ => Availability::Pending,
    }
}

/// Server information from usacloud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "CPU")]
    pub cpu: Option<i32>,

    #[serde(rename = "MemoryMB")]
    pub memory_mb: Option<i32>,

    #[serde(rename = "InstanceStatus")]
    pub instance_status: Option<String>,

    #[serde(rename = "Interfaces")]
    pub interfaces: Option<Vec<InterfaceInfo>>,
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

impl Identifiable for ServerInfo {
    fn resource_id(&self) -> ResourceId {
        ResourceId::from(self.id.as_str())
    }
}

/// Servers are created synchronously; only the instance status is awaited.
impl Resource for ServerInfo {
    fn instance_state(&self) -> Availability {
        if self.is_running() {
            Availability::Ready
        } else {
            Availability::Pending
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceInfo {
    #[serde(rename = "IPAddress")]
    pub ip_address: Option<String>,
}
