use super::{EditArgs, RetryArgs, explain};
use clap::Args;
use colored::Colorize;
use sacloud_builder::{DiskBuilder, DiskInfo, DiskPlan, Usacloud, validate_zone};
use sacloud_setup::SetupConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug, Clone)]
pub struct CreateDiskArgs {
    /// ディスク名
    #[arg(short, long)]
    pub name: String,
    /// プラン (ssd, hdd)
    #[arg(long, default_value = "ssd")]
    pub plan: DiskPlan,
    /// サイズ (GB)
    #[arg(long, default_value_t = sacloud_builder::disk::DEFAULT_DISK_SIZE_GB)]
    pub size: u32,
    /// コピー元アーカイブID
    #[arg(long, conflicts_with = "source_disk")]
    pub archive: Option<String>,
    /// コピー元ディスクID
    #[arg(long)]
    pub source_disk: Option<String>,
    /// 接続先サーバーID
    #[arg(long)]
    pub server_id: Option<String>,
    /// タグ（複数指定可）
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[command(flatten)]
    pub edit: EditArgs,
    #[command(flatten)]
    pub retry: RetryArgs,
}

impl CreateDiskArgs {
    pub fn builder(&self) -> DiskBuilder {
        let mut builder = DiskBuilder::new(&self.name)
            .plan(self.plan)
            .size_gb(self.size)
            .edit(self.edit.to_edit());

        if let Some(archive) = &self.archive {
            builder = builder.from_archive(archive.as_str());
        }
        if let Some(disk) = &self.source_disk {
            builder = builder.from_disk(disk.as_str());
        }
        if let Some(server_id) = &self.server_id {
            builder = builder.connect_to(server_id.as_str());
        }
        for tag in &self.tags {
            builder = builder.tag(tag);
        }
        builder
    }
}

pub async fn handle_create(
    ctx: &CancellationToken,
    zone: &str,
    config: SetupConfig,
    args: &CreateDiskArgs,
) -> anyhow::Result<()> {
    let builder = args.builder();
    builder.validate()?;
    validate_zone(zone)?;
    let config = args.retry.apply(config);

    let usacloud = Usacloud::new();
    usacloud.check_installed().await.map_err(explain)?;

    println!("{}", "ディスクを作成中...".yellow());
    println!("ゾーン: {}", zone.cyan());
    println!("名前: {}", args.name.cyan());
    println!(
        "{}",
        format!("最大試行回数: {}", config.retry_count).dimmed()
    );

    let disk = builder
        .build(ctx, zone, Arc::new(usacloud), &config)
        .await
        .map_err(explain)?;

    println!();
    println!("{}", "✓ ディスクの作成が完了しました".green());
    print_disk(&disk);
    Ok(())
}

pub fn print_disk(disk: &DiskInfo) {
    println!("  ID: {}", disk.id.cyan());
    println!("  名前: {}", disk.name);
    if let Some(size_mb) = disk.size_mb {
        println!("  サイズ: {} GB", size_mb / 1024);
    }
    if let Some(server_id) = &disk.server_id {
        println!("  接続先: {}", server_id);
    }
}
