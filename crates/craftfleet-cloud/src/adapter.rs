//! Provider adapter trait definition
//!
//! Every cloud backend implements [`Adapter`]: a small set of primitive
//! create/status/destroy calls the orchestrator sequences into full
//! server lifecycles. Adapters never wait for completion themselves; the
//! orchestrator polls [`Adapter::status`] after every creation.

use crate::error::Result;
use crate::graph::PrimitiveKind;
use crate::handle::ResourceHandle;
use crate::spec::Protocol;
use crate::tags::TagSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observed status of a provider object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Object is being created
    Creating,
    /// Object is running/available
    Running,
    /// Instance is stopped
    Stopped,
    /// Object is being deleted
    Deleting,
    /// Object no longer exists
    Deleted,
    /// Object is in an error state
    Error,
    /// Status is unknown
    Unknown,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Running => write!(f, "running"),
            ResourceStatus::Stopped => write!(f, "stopped"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Deleted => write!(f, "deleted"),
            ResourceStatus::Error => write!(f, "error"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Ingress rule opened on a security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub protocol: Protocol,
    pub port: u16,
    pub cidr: String,
    pub description: String,
}

impl FirewallRule {
    /// Rule open to the whole internet
    pub fn public(protocol: Protocol, port: u16, description: impl Into<String>) -> Self {
        Self {
            protocol,
            port,
            cidr: "0.0.0.0/0".to_string(),
            description: description.into(),
        }
    }
}

/// Everything needed to launch the server instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRequest {
    pub name: String,
    pub region: String,
    pub size: String,
    pub user_data: String,
    pub ssh_key_id: Option<String>,
    pub subnetwork_id: Option<String>,
    pub security_group_ids: Vec<String>,
    pub volume_id: Option<String>,
    pub tags: TagSet,
    /// Submit as a spot/preemptible request instead of an on-demand instance
    pub spot: bool,
}

/// Parameters of one primitive creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PrimitiveRequest {
    SshKey {
        name: String,
        public_key: String,
    },
    Network {
        name: String,
        cidr: String,
    },
    Subnetwork {
        name: String,
        network_id: String,
        cidr: String,
        region: String,
    },
    Gateway {
        name: String,
        network_id: String,
    },
    Route {
        network_id: String,
        subnetwork_id: String,
        gateway_id: String,
    },
    SecurityGroup {
        name: String,
        network_id: Option<String>,
        rules: Vec<FirewallRule>,
    },
    Volume {
        name: String,
        region: String,
        size_gb: u32,
    },
    Instance(InstanceRequest),
}

impl PrimitiveRequest {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveRequest::SshKey { .. } => PrimitiveKind::SshKey,
            PrimitiveRequest::Network { .. } => PrimitiveKind::Network,
            PrimitiveRequest::Subnetwork { .. } => PrimitiveKind::Subnetwork,
            PrimitiveRequest::Gateway { .. } => PrimitiveKind::Gateway,
            PrimitiveRequest::Route { .. } => PrimitiveKind::Route,
            PrimitiveRequest::SecurityGroup { .. } => PrimitiveKind::SecurityGroup,
            PrimitiveRequest::Volume { .. } => PrimitiveKind::Volume,
            PrimitiveRequest::Instance(req) if req.spot => PrimitiveKind::SpotRequest,
            PrimitiveRequest::Instance(_) => PrimitiveKind::Instance,
        }
    }
}

/// Cloud backend capability surface
///
/// Implementations are thin wrappers over a vendor SDK or CLI. All calls
/// may return before the provider has converged; the orchestrator polls.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Provider code used in manifests (e.g. "sakura")
    fn code(&self) -> &str;

    /// Provider display name for UI
    fn display_name(&self) -> &str;

    /// Whether this provider models the given primitive kind
    ///
    /// Kinds a provider has no equivalent for are skipped during create and
    /// never appear in the graph, so delete never asks for them.
    fn supports(&self, kind: PrimitiveKind) -> bool {
        let _ = kind;
        true
    }

    /// Submit a creation request and return the new object's id
    ///
    /// For a spot [`InstanceRequest`] the returned id is the spot request id.
    async fn create_primitive(&self, request: &PrimitiveRequest) -> Result<String>;

    /// Current status of an object
    async fn status(&self, kind: PrimitiveKind, id: &str) -> Result<ResourceStatus>;

    /// Request destruction of an object
    async fn destroy_primitive(&self, kind: PrimitiveKind, id: &str) -> Result<()>;

    /// Instance id a spot request resolved to, once fulfilled
    async fn resolve_spot_request(&self, request_id: &str) -> Result<Option<String>>;

    /// Cancel an outstanding spot request
    async fn cancel_spot_request(&self, request_id: &str) -> Result<()>;

    /// Read an instance back from the provider (address, tags, region)
    ///
    /// The returned handle carries a primary-only identifier.
    async fn describe(&self, instance_id: &str) -> Result<ResourceHandle>;

    /// Every instance visible to this provider account
    async fn list(&self) -> Result<Vec<ResourceHandle>>;
}
