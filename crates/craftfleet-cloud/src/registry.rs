//! Provider registry
//!
//! Built once at startup and passed to whoever needs to resolve a provider
//! code from a manifest into an adapter.

use crate::adapter::Adapter;
use crate::error::{CloudError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    adapters: BTreeMap<String, Arc<dyn Adapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own code, replacing any previous one
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> &mut Self {
        let code = adapter.code().to_string();
        if self.adapters.insert(code.clone(), adapter).is_some() {
            tracing::warn!("Replacing adapter registered for provider '{}'", code);
        }
        self
    }

    pub fn get(&self, code: &str) -> Result<Arc<dyn Adapter>> {
        self.adapters.get(code).cloned().ok_or_else(|| {
            CloudError::ProviderNotFound(format!(
                "{} (available: {})",
                code,
                self.codes().join(", ")
            ))
        })
    }

    pub fn codes(&self) -> Vec<&str> {
        self.adapters.keys().map(|k| k.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Adapter>> {
        self.adapters.values()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.codes())
            .finish()
    }
}
