use super::disk::print_disk;
use super::{EditArgs, RetryArgs, explain};
use clap::Args;
use colored::Colorize;
use sacloud_builder::{DiskBuilder, DiskPlan, ServerBuilder, Usacloud, validate_zone};
use sacloud_setup::SetupConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug, Clone)]
pub struct CreateServerArgs {
    /// サーバー名
    #[arg(short, long)]
    pub name: String,
    /// CPUコア数
    #[arg(long, default_value_t = 1)]
    pub core: u32,
    /// メモリ (GB)
    #[arg(long, default_value_t = 1)]
    pub memory: u32,
    /// システムディスクのコピー元アーカイブID（省略時はディスクなし）
    #[arg(long)]
    pub archive: Option<String>,
    /// システムディスクのプラン (ssd, hdd)
    #[arg(long, default_value = "ssd")]
    pub disk_plan: DiskPlan,
    /// システムディスクのサイズ (GB)
    #[arg(long, default_value_t = sacloud_builder::disk::DEFAULT_DISK_SIZE_GB)]
    pub disk_size: u32,
    /// 作成後に起動しない
    #[arg(long)]
    pub no_boot: bool,
    /// タグ（複数指定可）
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[command(flatten)]
    pub edit: EditArgs,
    #[command(flatten)]
    pub retry: RetryArgs,
}

impl CreateServerArgs {
    pub fn builder(&self) -> ServerBuilder {
        let mut builder = ServerBuilder::new(&self.name)
            .core(self.core)
            .memory_gb(self.memory)
            .boot_after_create(!self.no_boot);

        if let Some(archive) = &self.archive {
            let disk = DiskBuilder::new(format!("{}-disk", self.name))
                .from_archive(archive.as_str())
                .plan(self.disk_plan)
                .size_gb(self.disk_size)
                .edit(self.edit.to_edit());
            builder = builder.disk(disk);
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
    args: &CreateServerArgs,
) -> anyhow::Result<()> {
    let builder = args.builder();
    builder.validate()?;
    validate_zone(zone)?;
    let config = args.retry.apply(config);

    let usacloud = Usacloud::new();
    usacloud.check_installed().await.map_err(explain)?;

    println!("{}", "サーバーを作成中...".yellow());
    println!("ゾーン: {}", zone.cyan());
    println!("名前: {}", args.name.cyan());
    println!("スペック: {} core / {} GB", args.core, args.memory);

    let built = builder
        .build(ctx, zone, Arc::new(usacloud), &config)
        .await
        .map_err(explain)?;

    println!();
    println!("{}", "✓ サーバーの作成が完了しました".green());
    println!("  ID: {}", built.server.id.cyan());
    println!("  名前: {}", built.server.name);
    if let Some(ip) = built.server.ip_address() {
        println!("  IP: {}", ip.cyan());
    }
    let status = if built.server.is_running() {
        "up".green()
    } else {
        "down".yellow()
    };
    println!("  状態: {}", status);

    for disk in &built.disks {
        println!();
        print_disk(disk);
    }
    Ok(())
}
