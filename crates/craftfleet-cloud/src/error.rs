//! Cloud orchestration error types

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the lifecycle orchestrator and its adapters
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A provider call failed outright (authentication, quota, malformed request)
    #[error("Provider error: {0}")]
    Adapter(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid server spec: {0}")]
    InvalidSpec(String),

    #[error("Malformed resource graph tag: {0}")]
    CorruptGraph(String),

    #[error("Timed out after {elapsed:?} waiting for {operation}")]
    Timeout {
        operation: String,
        elapsed: Duration,
    },

    /// The instance exists but the workload never accepted connections
    #[error(
        "Server {id} is running but {address}:{port} did not accept connections after {attempts} attempts"
    )]
    ReadinessTimeout {
        id: String,
        address: String,
        port: u16,
        attempts: u32,
    },

    #[error("Cancelled while {0}")]
    Cancelled(String),

    #[error("Cannot read SSH public key {path}: {source}")]
    PublicKey {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Deadline-style failures (poll deadline or readiness bound)
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CloudError::Timeout { .. } | CloudError::ReadinessTimeout { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CloudError::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
