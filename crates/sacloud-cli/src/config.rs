//! 設定ファイルの探索と読み込み
//!
//! 優先順位: 設定ファイル < 環境変数 (SACLOUD_*) < コマンドライン引数

use sacloud_setup::{SetupConfig, SetupError};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Setup(#[from] SetupError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const CANDIDATES: &[&str] = &["sacloud.local.yaml", "sacloud.yaml"];

/// グローバル設定ディレクトリ (~/.config/sacloud)
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("sacloud");
    Ok(config_dir)
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 SACLOUD_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: sacloud.local.yaml, sacloud.yaml
/// 3. ./.sacloud/config.yaml
/// 4. ~/.config/sacloud/config.yaml (グローバル設定)
///
/// 見つからなければ `None`。設定ファイルは必須ではない。
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(config_path) = std::env::var("SACLOUD_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Some(path);
        }
    }

    if let Ok(current_dir) = std::env::current_dir() {
        for filename in CANDIDATES {
            let path = current_dir.join(filename);
            if path.exists() {
                return Some(path);
            }
        }

        let path = current_dir.join(".sacloud").join("config.yaml");
        if path.exists() {
            return Some(path);
        }
    }

    let global_config = get_config_dir().ok()?.join("config.yaml");
    global_config.exists().then_some(global_config)
}

/// YAML の設定ファイルを読み込む。記載のない項目はデフォルト値
pub fn load_file(path: &Path) -> Result<SetupConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(SetupConfig::default());
    }

    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// 設定ファイルと環境変数を重ねた設定と、読み込んだファイルのパス
pub fn load(explicit: Option<&Path>) -> Result<(SetupConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) if !path.exists() => {
            return Err(ConfigError::ConfigFileNotFound(path.to_path_buf()));
        }
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    let config = match &path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading config file");
            load_file(path)?
        }
        None => SetupConfig::default(),
    };

    Ok((config.apply_env()?, path))
}
