//! Sakura Cloud adapter for CraftFleet
//!
//! This crate implements the [`craftfleet_cloud::Adapter`] trait for Sakura
//! Cloud, so the generic orchestrator can run game servers there.
//!
//! # Mapping
//!
//! - ssh key → ssh-key
//! - rule group → packet filter
//! - volume → disk (SSD plan)
//! - instance → server with a shared NIC and an Ubuntu boot disk
//!
//! # Requirements
//!
//! - `usacloud` CLI must be installed and configured
//! - Authentication is managed through usacloud configuration
//!
//! # Example
//!
//! ```ignore
//! use craftfleet_cloud::{Orchestrator, ServerProvider};
//! use craftfleet_cloud_sakura::SakuraAdapter;
//! use std::sync::Arc;
//!
//! let orchestrator = Orchestrator::builder(Arc::new(SakuraAdapter::new("tk1a"))).build()?;
//! let handle = orchestrator.create_server(&spec).await?;
//! ```

pub mod adapter;
pub mod error;
pub mod usacloud;

pub use adapter::{PROVIDER_CODE, SakuraAdapter, parse_plan};
pub use error::{Result, SakuraError};
pub use usacloud::{DiskInfo, PacketFilterInfo, ServerInfo, SshKeyInfo, Usacloud};
