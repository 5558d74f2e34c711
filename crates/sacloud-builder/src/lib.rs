//! Sakura Cloud resource builders
//!
//! Disk and server provisioning on top of [`sacloud_setup::RetryableSetup`].
//! The CRUD calls go through the [`DiskApi`] / [`ServerApi`] seams, which
//! [`Usacloud`] implements by shelling out to the `usacloud` CLI.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  disks   ┌─────────────┐
//! │ ServerBuilder ├─────────►│ DiskBuilder │
//! └───────┬───────┘          └──────┬──────┘
//!         │   RetryableSetup        │
//!         └───────────┬─────────────┘
//!                     ▼
//!         ┌──────────────────────┐
//!         │ DiskApi / ServerApi  │◄── Usacloud (usacloud CLI)
//!         └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sacloud_builder::{DiskBuilder, ServerBuilder, Usacloud};
//! use sacloud_setup::SetupConfig;
//! use std::sync::Arc;
//!
//! let server = ServerBuilder::new("web-01")
//!     .core(2)
//!     .memory_gb(4)
//!     .disk(DiskBuilder::new("web-01-disk").from_archive("113000000001"))
//!     .build(&ctx, "is1a", Arc::new(Usacloud::new()), &SetupConfig::from_env()?)
//!     .await?;
//! ```

pub mod api;
pub mod disk;
pub mod error;
pub mod server;
pub mod usacloud;

pub use api::{CreateDiskRequest, CreateServerRequest, DiskApi, DiskEdit, DiskPlan, ServerApi};
pub use disk::DiskBuilder;
pub use error::{Result, SakuraError};
pub use server::{BuiltServer, ServerBuilder};
pub use usacloud::{DiskInfo, ServerInfo, Usacloud, ZONES, validate_zone};
