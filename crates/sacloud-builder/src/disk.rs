//! Disk provisioning
//!
//! A disk created from an archive is copied in the background. The builder
//! waits for the copy, recreates the disk when the copy fails, then writes
//! the requested settings into it and optionally attaches it to a server.

use crate::api::{CreateDiskRequest, DiskApi, DiskEdit, DiskPlan};
use crate::error::{Result, SakuraError};
use crate::usacloud::{DiskInfo, validate_zone};
use sacloud_setup::{ResourceId, RetryableSetup, SetupConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DISK_POLLING_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_DISK_SIZE_GB: u32 = 20;

#[derive(Debug, Clone)]
pub struct DiskBuilder {
    pub name: String,
    pub plan: DiskPlan,
    pub size_gb: u32,
    pub source_archive_id: Option<ResourceId>,
    pub source_disk_id: Option<ResourceId>,
    pub tags: Vec<String>,
    pub edit: DiskEdit,
    /// Server to connect the disk to once it is ready
    pub server_id: Option<ResourceId>,
}

impl DiskBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plan: DiskPlan::default(),
            size_gb: DEFAULT_DISK_SIZE_GB,
            source_archive_id: None,
            source_disk_id: None,
            tags: Vec::new(),
            edit: DiskEdit::default(),
            server_id: None,
        }
    }

    pub fn plan(mut self, plan: DiskPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn size_gb(mut self, size_gb: u32) -> Self {
        self.size_gb = size_gb;
        self
    }

    pub fn from_archive(mut self, archive_id: impl Into<ResourceId>) -> Self {
        self.source_archive_id = Some(archive_id.into());
        self
    }

    pub fn from_disk(mut self, disk_id: impl Into<ResourceId>) -> Self {
        self.source_disk_id = Some(disk_id.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn edit(mut self, edit: DiskEdit) -> Self {
        self.edit = edit;
        self
    }

    pub fn connect_to(mut self, server_id: impl Into<ResourceId>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SakuraError::InvalidConfig(
                "disk name must not be empty".to_string(),
            ));
        }
        if self.size_gb == 0 {
            return Err(SakuraError::InvalidConfig(format!(
                "disk {}: size must be greater than zero",
                self.name
            )));
        }
        if self.source_archive_id.is_some() && self.source_disk_id.is_some() {
            return Err(SakuraError::InvalidConfig(format!(
                "disk {}: source archive and source disk are mutually exclusive",
                self.name
            )));
        }
        if !self.edit.is_empty()
            && self.source_archive_id.is_none()
            && self.source_disk_id.is_none()
        {
            return Err(SakuraError::InvalidConfig(format!(
                "disk {}: editing requires a source archive or disk",
                self.name
            )));
        }
        Ok(())
    }

    fn request(&self) -> CreateDiskRequest {
        CreateDiskRequest {
            name: self.name.clone(),
            plan: self.plan,
            size_gb: self.size_gb,
            source_archive_id: self.source_archive_id.clone(),
            source_disk_id: self.source_disk_id.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Orchestrator configured for this disk
    pub fn setup<A: DiskApi + 'static>(
        &self,
        api: Arc<A>,
        config: &SetupConfig,
    ) -> RetryableSetup<DiskInfo> {
        let mut config = config.clone().wait_for_copy(true).wait_for_up(false);
        if config.polling_interval.is_none() {
            config.polling_interval = Some(DISK_POLLING_INTERVAL);
        }

        let req = self.request();
        let (create_api, read_api, delete_api) = (api.clone(), api.clone(), api.clone());
        let mut setup = RetryableSetup::new(
            move |zone: String| {
                let api = create_api.clone();
                let req = req.clone();
                async move {
                    api.create_disk(&zone, &req)
                        .await
                        .map_err(anyhow::Error::from)
                }
            },
            move |zone: String, id: ResourceId| {
                let api = read_api.clone();
                async move { api.read_disk(&zone, &id).await.map_err(anyhow::Error::from) }
            },
            move |zone: String, id: ResourceId| {
                let api = delete_api.clone();
                async move {
                    api.delete_disk(&zone, &id)
                        .await
                        .map_err(anyhow::Error::from)
                }
            },
        )
        .with_config(config);

        if !self.edit.is_empty() || self.server_id.is_some() {
            let edit = self.edit.clone();
            let server_id = self.server_id.clone();
            setup = setup.provision_before_up(move |zone, id, _disk| {
                provision_disk(api.clone(), zone, id, edit.clone(), server_id.clone())
            });
        }

        setup
    }

    /// Create the disk in `zone` and wait until it is usable
    pub async fn build<A: DiskApi + 'static>(
        &self,
        ctx: &CancellationToken,
        zone: &str,
        api: Arc<A>,
        config: &SetupConfig,
    ) -> Result<DiskInfo> {
        self.validate()?;
        validate_zone(zone)?;

        tracing::info!(zone, name = %self.name, size_gb = self.size_gb, "Building disk");
        let disk = self.setup(api, config).setup(ctx, zone).await?;
        Ok(disk)
    }
}

async fn provision_disk<A: DiskApi>(
    api: Arc<A>,
    zone: String,
    id: ResourceId,
    edit: DiskEdit,
    server_id: Option<ResourceId>,
) -> anyhow::Result<()> {
    if !edit.is_empty() {
        tracing::debug!(%id, "Editing disk");
        api.edit_disk(&zone, &id, &edit).await?;
    }

    if let Some(server_id) = server_id {
        tracing::debug!(%id, %server_id, "Connecting disk to server");
        api.connect_disk(&zone, &id, &server_id).await?;
    }

    Ok(())
}
