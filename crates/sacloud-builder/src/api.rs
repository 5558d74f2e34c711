//! CRUD seams the builders are written against
//!
//! [`Usacloud`](crate::Usacloud) implements both traits; tests substitute
//! in-memory fakes.

use crate::error::Result;
use crate::usacloud::{DiskInfo, ServerInfo};
use async_trait::async_trait;
use sacloud_setup::ResourceId;

/// Disk storage class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiskPlan {
    #[default]
    Ssd,
    Hdd,
}

impl DiskPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskPlan::Ssd => "ssd",
            DiskPlan::Hdd => "hdd",
        }
    }
}

impl std::str::FromStr for DiskPlan {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ssd" => Ok(DiskPlan::Ssd),
            "hdd" => Ok(DiskPlan::Hdd),
            other => Err(format!("unknown disk plan: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateDiskRequest {
    pub name: String,
    pub plan: DiskPlan,
    pub size_gb: u32,
    pub source_archive_id: Option<ResourceId>,
    pub source_disk_id: Option<ResourceId>,
    pub tags: Vec<String>,
}

/// Settings written into a freshly copied disk image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskEdit {
    pub hostname: Option<String>,
    pub password: Option<String>,
    pub ssh_key_ids: Vec<String>,
    /// Startup scripts
    pub note_ids: Vec<String>,
    pub disable_password_auth: bool,
}

impl DiskEdit {
    pub fn is_empty(&self) -> bool {
        self == &DiskEdit::default()
    }
}

#[derive(Debug, Clone)]
pub struct CreateServerRequest {
    pub name: String,
    pub core: u32,
    pub memory_gb: u32,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait DiskApi: Send + Sync {
    async fn create_disk(&self, zone: &str, req: &CreateDiskRequest) -> Result<DiskInfo>;

    async fn read_disk(&self, zone: &str, id: &ResourceId) -> Result<DiskInfo>;

    async fn delete_disk(&self, zone: &str, id: &ResourceId) -> Result<()>;

    async fn edit_disk(&self, zone: &str, id: &ResourceId, edit: &DiskEdit) -> Result<()>;

    async fn connect_disk(&self, zone: &str, id: &ResourceId, server_id: &ResourceId)
    -> Result<()>;
}

#[async_trait]
pub trait ServerApi: Send + Sync {
    async fn create_server(&self, zone: &str, req: &CreateServerRequest) -> Result<ServerInfo>;

    async fn read_server(&self, zone: &str, id: &ResourceId) -> Result<ServerInfo>;

    async fn delete_server(&self, zone: &str, id: &ResourceId, with_disks: bool) -> Result<()>;

    async fn power_on(&self, zone: &str, id: &ResourceId) -> Result<()>;
}
