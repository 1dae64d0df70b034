//! Handle to a provisioned server

use crate::identifier::ResourceId;
use crate::tags::TagSet;
use serde::{Deserialize, Serialize};

/// Provisioned server as seen by callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub id: ResourceId,
    pub name: String,
    pub region: String,
    pub public_address: Option<String>,
    pub tags: TagSet,
}

impl ResourceHandle {
    pub fn new(id: ResourceId, name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            region: region.into(),
            public_address: None,
            tags: TagSet::new(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.public_address = Some(address.into());
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    /// Replace the identifier, e.g. to attach the spot request token
    pub fn with_id(mut self, id: ResourceId) -> Self {
        self.id = id;
        self
    }
}
