mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::disk::CreateDiskArgs;
use commands::server::CreateServerArgs;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "sacloud")]
#[command(about = "さくらのクラウドのリソースを、失敗しても作り直して構築する", long_about = None)]
struct Cli {
    /// ゾーン (is1a, is1b, tk1a, tk1b, tk1v)
    #[arg(
        short,
        long,
        global = true,
        env = "SAKURACLOUD_ZONE",
        default_value = "is1a"
    )]
    zone: String,
    /// 設定ファイル（省略時は自動検索）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// ディスク操作
    #[command(subcommand)]
    Disk(DiskCommands),
    /// サーバー操作
    #[command(subcommand)]
    Server(ServerCommands),
    /// 設定の確認
    #[command(subcommand)]
    Config(ConfigCommands),
    /// バージョン情報を表示
    Version,
}

#[derive(Subcommand)]
enum DiskCommands {
    /// ディスクを作成（コピー失敗時は作り直す）
    Create(CreateDiskArgs),
}

#[derive(Subcommand)]
enum ServerCommands {
    /// サーバーを作成し、ディスクを接続して起動
    Create(CreateServerArgs),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// 設定ファイル・環境変数を反映した設定を表示
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログは stderr に出力 (RUST_LOG で調整)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("sacloud {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let (config, config_path) = config::load(cli.config.as_deref())?;

    if let Commands::Config(ConfigCommands::Show) = cli.command {
        match &config_path {
            Some(path) => println!(
                "{}",
                format!("# 設定ファイル: {}", path.display()).dimmed()
            ),
            None => println!("{}", "# 設定ファイルなし（デフォルト値）".dimmed()),
        }
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    if let Some(path) = &config_path {
        println!(
            "{}",
            format!("設定ファイル: {}", path.display()).dimmed()
        );
    }

    // Ctrl-C で進行中の処理を中断
    let ctx = CancellationToken::new();
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!("{}", "中断しています...".yellow());
            signal_ctx.cancel();
        }
    });

    match &cli.command {
        Commands::Disk(DiskCommands::Create(args)) => {
            commands::disk::handle_create(&ctx, &cli.zone, config, args).await
        }
        Commands::Server(ServerCommands::Create(args)) => {
            commands::server::handle_create(&ctx, &cli.zone, config, args).await
        }
        Commands::Config(_) | Commands::Version => Ok(()),
    }
}
