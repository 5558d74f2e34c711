pub mod disk;
pub mod server;

use clap::Args;
use colored::Colorize;
use sacloud_builder::{DiskEdit, SakuraError};
use sacloud_setup::{SetupConfig, WaitStrategy};
use std::time::Duration;

/// リトライ・待機に関する共通オプション
#[derive(Args, Debug, Default, Clone)]
pub struct RetryArgs {
    /// 作成の最大試行回数
    #[arg(long)]
    pub retry_count: Option<u32>,
    /// 状態確認の間隔（秒）
    #[arg(long, value_name = "SECS")]
    pub polling_interval: Option<u64>,
    /// コピー待ちのタイムアウト（秒）
    #[arg(long, value_name = "SECS")]
    pub copy_timeout: Option<u64>,
    /// 起動待ちのタイムアウト（秒）
    #[arg(long, value_name = "SECS")]
    pub up_timeout: Option<u64>,
    /// 待機方式 (polling, notify)
    #[arg(long)]
    pub wait_strategy: Option<WaitStrategy>,
}

impl RetryArgs {
    /// コマンドライン引数を設定に上書き
    pub fn apply(&self, mut config: SetupConfig) -> SetupConfig {
        if let Some(count) = self.retry_count {
            config.retry_count = count;
        }
        if let Some(secs) = self.polling_interval {
            config.polling_interval = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = self.copy_timeout {
            config.copy_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = self.up_timeout {
            config.up_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(strategy) = self.wait_strategy {
            config.wait_strategy = strategy;
        }
        config
    }
}

/// ディスクの修正（ホスト名・パスワード・公開鍵・スタートアップスクリプト）
#[derive(Args, Debug, Default, Clone)]
pub struct EditArgs {
    /// ホスト名
    #[arg(long)]
    pub hostname: Option<String>,
    /// 管理者パスワード
    #[arg(long, env = "SACLOUD_DISK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// 公開鍵ID（複数指定可）
    #[arg(long = "ssh-key-id")]
    pub ssh_key_ids: Vec<String>,
    /// スタートアップスクリプトID（複数指定可）
    #[arg(long = "note-id")]
    pub note_ids: Vec<String>,
    /// パスワード認証を無効化
    #[arg(long)]
    pub disable_pw_auth: bool,
}

impl EditArgs {
    pub fn to_edit(&self) -> DiskEdit {
        DiskEdit {
            hostname: self.hostname.clone(),
            password: self.password.clone(),
            ssh_key_ids: self.ssh_key_ids.clone(),
            note_ids: self.note_ids.clone(),
            disable_password_auth: self.disable_pw_auth,
        }
    }
}

/// ビルダーのエラーに対処のヒントを添える
pub fn explain(err: SakuraError) -> anyhow::Error {
    match &err {
        SakuraError::Setup(setup) if setup.is_max_retry_count_exceeded() => {
            eprintln!(
                "{}",
                "ヒント: --retry-count または SACLOUD_RETRY_COUNT で試行回数を増やせます".yellow()
            );
        }
        SakuraError::Setup(setup) if setup.is_cancelled() => {
            eprintln!(
                "{}",
                "中断しました。作成途中のリソースが残っている可能性があります".yellow()
            );
        }
        SakuraError::UsacloudNotFound => {
            eprintln!("{}", "usacloud をインストールしてください".yellow());
        }
        _ => {}
    }
    err.into()
}
