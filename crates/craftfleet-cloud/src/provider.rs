//! Server provider capability interface
//!
//! The operations CLI commands call. [`crate::Orchestrator`] implements them
//! once for every [`crate::Adapter`].

use crate::error::Result;
use crate::handle::ResourceHandle;
use crate::identifier::ResourceId;
use crate::spec::ServerSpec;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait ServerProvider: Send + Sync {
    /// Provision a server and wait until it is running (and, for TCP editions, reachable)
    async fn create_server(&self, spec: &ServerSpec) -> Result<ResourceHandle>;

    /// Tear down a server and every object created for it
    async fn delete_server(&self, id: &ResourceId, spec: &ServerSpec) -> Result<()>;

    /// Apply the edition's update procedure on the running instance
    async fn update_server(&self, id: &ResourceId, spec: &ServerSpec) -> Result<()>;

    /// Copy a plugin/mod file to the instance and restart the workload
    async fn upload_plugin(
        &self,
        id: &ResourceId,
        spec: &ServerSpec,
        source: &Path,
        destination: &str,
    ) -> Result<()>;

    /// All servers carrying the ownership tag
    async fn list_servers(&self) -> Result<Vec<ResourceHandle>>;

    async fn get_server(&self, id: &ResourceId, spec: &ServerSpec) -> Result<ResourceHandle>;
}
