//! Sakura Cloud provisioning core
//!
//! This crate drives the multi-step creation of cloud resources whose
//! remote side finishes asynchronously (disk copies, server boots).
//! Resource-specific CRUD calls are supplied by the caller as closures;
//! the crate itself performs no I/O.
//!
//! # Flow
//!
//! ```text
//! ┌──────────┐    ┌────────────────┐ ready ┌──────────────┐    ┌───────────────┐
//! │ Creating ├───►│ WaitingForCopy ├──────►│ Provisioning ├───►│ WaitingForUp  ├──► Succeeded
//! └────▲─────┘    └───────┬────────┘       └──────────────┘    └───────────────┘
//!      │                  │ failed
//!      │            ┌─────▼─────┐
//!      └────────────┤ Deleting  │  (budget exhausted ──► MaxRetryCountExceeded)
//!        next try   └───────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sacloud_setup::{RetryableSetup, SetupConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let setup = RetryableSetup::new(
//!     move |zone| create_disk(zone),
//!     move |zone, id| read_disk(zone, id),
//!     move |zone, id| delete_disk(zone, id),
//! )
//! .with_config(SetupConfig::default().wait_for_copy(true));
//!
//! let disk = setup.setup(&CancellationToken::new(), "is1a").await?;
//! ```

pub mod accessor;
pub mod config;
pub mod delete;
pub mod error;
pub mod notify;
pub mod setup;
pub mod waiter;

// Re-exports
pub use accessor::{Availability, Capability, Classifier, Identifiable, Resource, ResourceId};
pub use config::{SetupConfig, WaitStrategy};
pub use delete::{DeleteError, delete_with_retry};
pub use error::{Result, SetupError};
pub use notify::NotifyWaiter;
pub use setup::{RetryableSetup, SetupPhase};
pub use waiter::{PollingWaiter, Reader, Settled, StateWaiter, WaitError, waiter_for};
