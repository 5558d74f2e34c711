//! Server provisioning
//!
//! サーバー自体は同期的に作成される。ディスクの作成・接続は
//! provision フックの中で行い、必要なら起動してから up を待つ。

use crate::api::{CreateServerRequest, DiskApi, ServerApi};
use crate::disk::DiskBuilder;
use crate::error::{Result, SakuraError};
use crate::usacloud::{DiskInfo, ServerInfo, validate_zone};
use sacloud_setup::{ResourceId, RetryableSetup, SetupConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const SERVER_POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// Server together with the disks built for it
#[derive(Debug, Clone)]
pub struct BuiltServer {
    pub server: ServerInfo,
    pub disks: Vec<DiskInfo>,
}

#[derive(Debug, Clone)]
pub struct ServerBuilder {
    pub name: String,
    pub core: u32,
    pub memory_gb: u32,
    pub tags: Vec<String>,
    /// Built in order and connected to the server
    pub disks: Vec<DiskBuilder>,
    pub boot_after_create: bool,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            core: 1,
            memory_gb: 1,
            tags: Vec::new(),
            disks: Vec::new(),
            boot_after_create: true,
        }
    }

    pub fn core(mut self, core: u32) -> Self {
        self.core = core;
        self
    }

    pub fn memory_gb(mut self, memory_gb: u32) -> Self {
        self.memory_gb = memory_gb;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn disk(mut self, disk: DiskBuilder) -> Self {
        self.disks.push(disk);
        self
    }

    pub fn boot_after_create(mut self, boot: bool) -> Self {
        self.boot_after_create = boot;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SakuraError::InvalidConfig(
                "server name must not be empty".to_string(),
            ));
        }
        if self.core == 0 || self.memory_gb == 0 {
            return Err(SakuraError::InvalidConfig(format!(
                "server {}: core and memory must be greater than zero",
                self.name
            )));
        }
        for disk in &self.disks {
            disk.validate()?;
            if disk.server_id.is_some() {
                return Err(SakuraError::InvalidConfig(format!(
                    "server {}: disk {} is already bound to another server",
                    self.name, disk.name
                )));
            }
        }
        Ok(())
    }

    fn request(&self) -> CreateServerRequest {
        CreateServerRequest {
            name: self.name.clone(),
            core: self.core,
            memory_gb: self.memory_gb,
            tags: self.tags.clone(),
        }
    }

    /// サーバーにはコピー待ちがなく、起動する場合のみ up を待つ
    fn setup_config(&self, config: &SetupConfig) -> SetupConfig {
        let mut server_config = config
            .clone()
            .wait_for_copy(false)
            .wait_for_up(self.boot_after_create);
        if server_config.polling_interval.is_none() {
            server_config.polling_interval = Some(SERVER_POLLING_INTERVAL);
        }
        server_config
    }

    /// Create the server in `zone`, build its disks and optionally boot it
    pub async fn build<A: DiskApi + ServerApi + 'static>(
        &self,
        ctx: &CancellationToken,
        zone: &str,
        api: Arc<A>,
        config: &SetupConfig,
    ) -> Result<BuiltServer> {
        self.validate()?;
        validate_zone(zone)?;

        let server_config = self.setup_config(config);
        let built = Arc::new(Mutex::new(Vec::new()));
        let req = self.request();
        let (create_api, read_api, delete_api) = (api.clone(), api.clone(), api.clone());

        let hook = ProvisionHook {
            ctx: ctx.clone(),
            api,
            disks: Arc::new(self.disks.clone()),
            config: config.clone(),
            built: built.clone(),
            boot: self.boot_after_create,
        };

        let setup = RetryableSetup::new(
            move |zone: String| {
                let api = create_api.clone();
                let req = req.clone();
                async move {
                    api.create_server(&zone, &req)
                        .await
                        .map_err(anyhow::Error::from)
                }
            },
            move |zone: String, id: ResourceId| {
                let api = read_api.clone();
                async move {
                    api.read_server(&zone, &id)
                        .await
                        .map_err(anyhow::Error::from)
                }
            },
            move |zone: String, id: ResourceId| {
                let api = delete_api.clone();
                async move {
                    api.delete_server(&zone, &id, true)
                        .await
                        .map_err(anyhow::Error::from)
                }
            },
        )
        .provision_before_up(move |zone, id, _server| hook.clone().run(zone, id))
        .with_config(server_config);

        tracing::info!(
            zone,
            name = %self.name,
            disks = self.disks.len(),
            boot = self.boot_after_create,
            "Building server"
        );
        let server = setup.setup(ctx, zone).await?;
        let disks = built.lock().await.clone();

        Ok(BuiltServer { server, disks })
    }
}

struct ProvisionHook<A> {
    ctx: CancellationToken,
    api: Arc<A>,
    disks: Arc<Vec<DiskBuilder>>,
    config: SetupConfig,
    built: Arc<Mutex<Vec<DiskInfo>>>,
    boot: bool,
}

impl<A> Clone for ProvisionHook<A> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            api: self.api.clone(),
            disks: self.disks.clone(),
            config: self.config.clone(),
            built: self.built.clone(),
            boot: self.boot,
        }
    }
}

impl<A: DiskApi + ServerApi + 'static> ProvisionHook<A> {
    /// Disks that already exist from an earlier try are not rebuilt
    async fn run(self, zone: String, server_id: ResourceId) -> anyhow::Result<()> {
        let done = self.built.lock().await.len();

        for disk in self.disks.iter().skip(done) {
            let disk = disk
                .clone()
                .connect_to(server_id.clone())
                .build(&self.ctx, &zone, self.api.clone(), &self.config)
                .await?;
            tracing::info!(%server_id, disk_id = %disk.id, "Disk connected");
            self.built.lock().await.push(disk);
        }

        if self.boot {
            tracing::info!(%server_id, "Powering on server");
            self.api.power_on(&zone, &server_id).await?;
        }

        Ok(())
    }
}
