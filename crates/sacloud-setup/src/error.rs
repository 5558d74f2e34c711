//! Provisioning error types

use crate::accessor::ResourceId;
use crate::setup::SetupPhase;
use crate::waiter::WaitError;
use thiserror::Error;

/// Terminal outcome of a failed [`RetryableSetup::setup`](crate::RetryableSetup::setup) call
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Create failed: {0}")]
    Create(#[source] anyhow::Error),

    #[error("Waiting for copy of {id} failed: {source}")]
    WaitForCopy {
        id: ResourceId,
        #[source]
        source: WaitError,
    },

    #[error("Provisioning {id} failed: {source}")]
    Provision {
        id: ResourceId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Waiting for {id} to come up failed: {source}")]
    WaitForUp {
        id: ResourceId,
        #[source]
        source: WaitError,
    },

    #[error("Resource {id} failed to start")]
    FailedToStart { id: ResourceId },

    #[error("Cancelled while {phase}")]
    Cancelled { phase: SetupPhase },

    #[error("Max retry count exceeded: all {retry_count} attempts failed")]
    MaxRetryCountExceeded { retry_count: u32 },
}

impl SetupError {
    /// True when every attempt ended in a failed copy and nothing fatal happened
    pub fn is_max_retry_count_exceeded(&self) -> bool {
        matches!(self, SetupError::MaxRetryCountExceeded { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SetupError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, SetupError>;
