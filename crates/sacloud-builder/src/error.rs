//! Sakura Cloud builder error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SakuraError {
    #[error("usacloud not found. Please install: brew install usacloud")]
    UsacloudNotFound,

    #[error("usacloud command failed: {0}")]
    CommandFailed(String),

    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Disk not found: {0}")]
    DiskNotFound(String),

    #[error("Invalid zone: {0}")]
    InvalidZone(String),

    #[error("Invalid builder configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Setup error: {0}")]
    Setup(#[from] sacloud_setup::SetupError),
}

pub type Result<T> = std::result::Result<T, SakuraError>;
