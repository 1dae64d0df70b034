//! CraftFleet Cloud Orchestration
//!
//! This crate provides the provider-agnostic engine that provisions, updates,
//! inspects and tears down a single game server host on any cloud backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 CraftFleet CLI                   │
//! │     (create / delete / update / list / get)      │
//! └─────────────────┬───────────────────────────────┘
//!                   │  trait ServerProvider
//! ┌─────────────────▼───────────────────────────────┐
//! │                craftfleet-cloud                  │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │             Orchestrator                  │   │
//! │  │  key → network → rules → volume → server  │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │
//! │  │  Waiter  │  │  Probe   │  │   Progress   │   │
//! │  └──────────┘  └──────────┘  └──────────────┘   │
//! └───────┬─────────────────────────────────────────┘
//!         │  trait Adapter
//! ┌───────▼───────┐
//! │ sakura-cloud  │  ...
//! │    adapter    │
//! └───────────────┘
//! ```
//!
//! Identifiers are `primary` or `primary#secondary`, where the secondary
//! token is the spot request an instance came from.

pub mod adapter;
pub mod bootstrap;
pub mod error;
pub mod graph;
pub mod handle;
pub mod identifier;
pub mod orchestrator;
pub mod probe;
pub mod progress;
pub mod provider;
pub mod registry;
pub mod remote;
pub mod spec;
pub mod tags;
pub mod waiter;

// Re-exports
pub use adapter::{Adapter, FirewallRule, InstanceRequest, PrimitiveRequest, ResourceStatus};
pub use bootstrap::{BootstrapRenderer, TemplateRenderer};
pub use error::{CloudError, Result};
pub use graph::{GraphEntry, PrimitiveKind, ResourceGraph};
pub use handle::ResourceHandle;
pub use identifier::{ResourceId, decode, encode};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorOptions};
pub use probe::{ReadinessCheck, TcpProbe};
pub use progress::{ProgressOutcome, ProgressSession, ProgressSink, TracingSink};
pub use provider::ServerProvider;
pub use registry::ProviderRegistry;
pub use remote::{RemoteExecutor, RemoteTarget, SshExecutor};
pub use spec::{Edition, MonitoringSpec, Protocol, RconSpec, ServerSpec, SshSpec, VolumeSpec};
pub use tags::{OWNERSHIP_TAG, TagSet};
pub use waiter::{Deadline, Waiter};
pub use tokio_util::sync::CancellationToken;
