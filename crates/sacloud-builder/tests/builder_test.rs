//! Disk and server builders against an in-memory Sakura Cloud

use async_trait::async_trait;
use sacloud_builder::{
    CreateDiskRequest, CreateServerRequest, DiskApi, DiskBuilder, DiskEdit, DiskInfo, Result,
    SakuraError, ServerApi, ServerBuilder, ServerInfo,
};
use sacloud_setup::{ResourceId, SetupConfig, SetupError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Script {
    /// The first N created disks end their copy in `failed`
    failing_copies: usize,
    /// Disk reads returning `migrating` before the copy settles
    pending_polls: u32,
    /// Server reads returning `down` after power-on
    boot_polls: u32,
    /// Edit calls rejected before one succeeds
    edit_failures: u32,
    /// Power-on calls rejected before one succeeds
    power_on_failures: u32,
}

#[derive(Default)]
struct State {
    disks: Vec<DiskInfo>,
    servers: Vec<ServerInfo>,
    disk_polls: HashMap<String, u32>,
    server_polls: u32,
    powered_on: bool,
    power_ons: u32,
    edits: u32,
    calls: Vec<String>,
}

#[derive(Default)]
struct FakeSakura {
    script: Script,
    state: Mutex<State>,
}

impl FakeSakura {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            ..Default::default()
        })
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl DiskApi for FakeSakura {
    async fn create_disk(&self, _zone: &str, req: &CreateDiskRequest) -> Result<DiskInfo> {
        let mut state = self.state.lock().unwrap();
        let disk = DiskInfo {
            id: format!("1131000000{:02}", state.disks.len()),
            name: req.name.clone(),
            availability: Some("migrating".to_string()),
            size_mb: Some(u64::from(req.size_gb) * 1024),
            server_id: None,
        };
        state.calls.push(format!("disk create {}", req.name));
        state.disks.push(disk.clone());
        Ok(disk)
    }

    async fn read_disk(&self, _zone: &str, id: &ResourceId) -> Result<DiskInfo> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("disk read {}", id));

        let index = state
            .disks
            .iter()
            .position(|d| d.id == id.as_str())
            .ok_or_else(|| SakuraError::DiskNotFound(id.to_string()))?;

        let seen = state.disk_polls.entry(id.to_string()).or_insert(0);
        *seen += 1;
        let availability = if *seen <= self.script.pending_polls {
            "migrating"
        } else if index < self.script.failing_copies {
            "failed"
        } else {
            "available"
        };

        let disk = &mut state.disks[index];
        disk.availability = Some(availability.to_string());
        Ok(disk.clone())
    }

    async fn delete_disk(&self, _zone: &str, id: &ResourceId) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("disk delete {}", id));
        Ok(())
    }

    async fn edit_disk(&self, _zone: &str, id: &ResourceId, edit: &DiskEdit) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.edits += 1;
        if state.edits <= self.script.edit_failures {
            return Err(SakuraError::CommandFailed(
                "409 Conflict: disk is busy".to_string(),
            ));
        }
        state.calls.push(format!(
            "disk edit {} {}",
            id,
            edit.hostname.as_deref().unwrap_or("-")
        ));
        Ok(())
    }

    async fn connect_disk(
        &self,
        _zone: &str,
        id: &ResourceId,
        server_id: &ResourceId,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("disk connect {} {}", id, server_id));
        if let Some(disk) = state.disks.iter_mut().find(|d| d.id == id.as_str()) {
            disk.server_id = Some(server_id.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl ServerApi for FakeSakura {
    async fn create_server(&self, _zone: &str, req: &CreateServerRequest) -> Result<ServerInfo> {
        let mut state = self.state.lock().unwrap();
        let server = ServerInfo {
            id: format!("1129000000{:02}", state.servers.len()),
            name: req.name.clone(),
            cpu: Some(req.core as i32),
            memory_mb: Some((req.memory_gb * 1024) as i32),
            instance_status: Some("down".to_string()),
            interfaces: None,
        };
        state.calls.push(format!("server create {}", req.name));
        state.servers.push(server.clone());
        Ok(server)
    }

    async fn read_server(&self, _zone: &str, id: &ResourceId) -> Result<ServerInfo> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("server read {}", id));

        let up = if state.powered_on {
            state.server_polls += 1;
            state.server_polls > self.script.boot_polls
        } else {
            false
        };

        let server = state
            .servers
            .iter_mut()
            .find(|s| s.id == id.as_str())
            .ok_or_else(|| SakuraError::ServerNotFound(id.to_string()))?;
        server.instance_status = Some(if up { "up" } else { "down" }.to_string());
        Ok(server.clone())
    }

    async fn delete_server(&self, _zone: &str, id: &ResourceId, _with_disks: bool) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("server delete {}", id));
        Ok(())
    }

    async fn power_on(&self, _zone: &str, id: &ResourceId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("server power-on {}", id));
        state.power_ons += 1;
        if state.power_ons <= self.script.power_on_failures {
            return Err(SakuraError::CommandFailed(
                "409 Conflict: server is being migrated".to_string(),
            ));
        }
        state.powered_on = true;
        Ok(())
    }
}

fn archive_disk(name: &str) -> DiskBuilder {
    DiskBuilder::new(name).from_archive("113000000001")
}

#[tokio::test(start_paused = true)]
async fn test_disk_build_waits_for_copy_then_edits() {
    let api = FakeSakura::new(Script {
        pending_polls: 2,
        ..Default::default()
    });
    let edit = DiskEdit {
        hostname: Some("web-01".to_string()),
        ssh_key_ids: vec!["112800000001".to_string()],
        ..Default::default()
    };

    let disk = archive_disk("web-01-disk")
        .edit(edit)
        .build(
            &CancellationToken::new(),
            "is1a",
            api.clone(),
            &SetupConfig::default(),
        )
        .await
        .unwrap();

    assert_eq!(disk.id, "113100000000");
    assert_eq!(disk.availability.as_deref(), Some("available"));
    assert_eq!(
        api.calls(),
        vec![
            "disk create web-01-disk",
            "disk read 113100000000",
            "disk read 113100000000",
            "disk read 113100000000",
            "disk edit 113100000000 web-01",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_disk_build_recreates_failed_copy() {
    let api = FakeSakura::new(Script {
        failing_copies: 1,
        ..Default::default()
    });

    let disk = archive_disk("db-disk")
        .build(
            &CancellationToken::new(),
            "tk1a",
            api.clone(),
            &SetupConfig::default(),
        )
        .await
        .unwrap();

    assert_eq!(disk.id, "113100000001");
    assert_eq!(api.count("disk create"), 2);
    assert_eq!(api.calls()[2], "disk delete 113100000000");
}

#[tokio::test(start_paused = true)]
async fn test_disk_build_gives_up_after_retry_count() {
    let api = FakeSakura::new(Script {
        failing_copies: usize::MAX,
        ..Default::default()
    });

    let err = archive_disk("db-disk")
        .build(
            &CancellationToken::new(),
            "is1b",
            api.clone(),
            &SetupConfig::default().retry_count(2),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SakuraError::Setup(SetupError::MaxRetryCountExceeded { retry_count: 2 })
    ));
    assert_eq!(api.count("disk create"), 2);
    assert_eq!(api.count("disk delete"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disk_edit_retried_within_provisioning_budget() {
    let api = FakeSakura::new(Script {
        edit_failures: 1,
        ..Default::default()
    });
    let edit = DiskEdit {
        password: Some("p@ssw0rd".to_string()),
        ..Default::default()
    };
    let config = SetupConfig::default().provisioning_retry(2, Duration::from_secs(5));

    archive_disk("web-01-disk")
        .edit(edit)
        .build(&CancellationToken::new(), "is1a", api.clone(), &config)
        .await
        .unwrap();

    assert_eq!(api.count("disk edit"), 1);
    assert_eq!(api.count("disk create"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disk_edit_failure_is_fatal_by_default() {
    let api = FakeSakura::new(Script {
        edit_failures: 1,
        ..Default::default()
    });
    let edit = DiskEdit {
        password: Some("p@ssw0rd".to_string()),
        ..Default::default()
    };

    let err = archive_disk("web-01-disk")
        .edit(edit)
        .build(
            &CancellationToken::new(),
            "is1a",
            api.clone(),
            &SetupConfig::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SakuraError::Setup(SetupError::Provision { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_server_build_with_disks_and_boot() {
    let api = FakeSakura::new(Script {
        pending_polls: 1,
        boot_polls: 2,
        ..Default::default()
    });

    let built = ServerBuilder::new("web-01")
        .core(2)
        .memory_gb(4)
        .disk(archive_disk("web-01-system"))
        .disk(DiskBuilder::new("web-01-data").size_gb(100))
        .build(
            &CancellationToken::new(),
            "is1a",
            api.clone(),
            &SetupConfig::default(),
        )
        .await
        .unwrap();

    assert_eq!(built.server.id, "112900000000");
    assert!(built.server.is_running());
    assert_eq!(built.disks.len(), 2);
    assert_eq!(built.disks[0].name, "web-01-system");
    assert_eq!(built.disks[1].name, "web-01-data");

    let calls = api.calls();
    assert_eq!(calls[0], "server create web-01");
    assert!(calls.contains(&"disk connect 113100000000 112900000000".to_string()));
    assert!(calls.contains(&"disk connect 113100000001 112900000000".to_string()));

    let power_on = calls
        .iter()
        .position(|c| c.starts_with("server power-on"))
        .unwrap();
    let last_connect = calls
        .iter()
        .rposition(|c| c.starts_with("disk connect"))
        .unwrap();
    assert!(last_connect < power_on);
    // 2 reads while booting, 1 once up
    assert_eq!(api.count("server read"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_server_retry_keeps_built_disks() {
    let api = FakeSakura::new(Script {
        power_on_failures: 1,
        ..Default::default()
    });
    let config = SetupConfig::default().provisioning_retry(2, Duration::from_secs(5));

    let built = ServerBuilder::new("web-01")
        .disk(archive_disk("web-01-system"))
        .disk(DiskBuilder::new("web-01-data").size_gb(100))
        .build(&CancellationToken::new(), "is1a", api.clone(), &config)
        .await
        .unwrap();

    // 2回目の試行では作成済みのディスクを作り直さない
    assert_eq!(api.count("disk create"), 2);
    assert_eq!(api.count("disk connect"), 2);
    assert_eq!(api.count("server power-on"), 2);
    assert_eq!(api.count("server create"), 1);
    assert_eq!(built.disks.len(), 2);
    assert!(built.server.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_server_build_without_boot() {
    let api = FakeSakura::new(Script::default());

    let built = ServerBuilder::new("batch-01")
        .disk(archive_disk("batch-01-disk"))
        .boot_after_create(false)
        .build(
            &CancellationToken::new(),
            "tk1v",
            api.clone(),
            &SetupConfig::default(),
        )
        .await
        .unwrap();

    assert!(!built.server.is_running());
    assert_eq!(built.disks.len(), 1);
    assert_eq!(api.count("server power-on"), 0);
    assert_eq!(api.count("server read"), 0);
}

#[tokio::test]
async fn test_invalid_zone_makes_no_calls() {
    let api = FakeSakura::new(Script::default());

    let err = archive_disk("web-01-disk")
        .build(
            &CancellationToken::new(),
            "us-east-1",
            api.clone(),
            &SetupConfig::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SakuraError::InvalidZone(_)));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_server_build() {
    let api = FakeSakura::new(Script::default());
    let ctx = CancellationToken::new();
    ctx.cancel();

    let err = ServerBuilder::new("web-01")
        .build(&ctx, "is1a", api.clone(), &SetupConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SakuraError::Setup(SetupError::Cancelled { .. })
    ));
    assert!(api.calls().is_empty());
}
