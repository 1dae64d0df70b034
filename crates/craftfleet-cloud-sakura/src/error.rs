//! Sakura Cloud adapter error types

use craftfleet_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SakuraError {
    #[error("usacloud not found. Please install: brew install usacloud")]
    UsacloudNotFound,

    #[error("usacloud command failed: {0}")]
    CommandFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid zone: {0}")]
    InvalidZone(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Unsupported on Sakura Cloud: {0}")]
    Unsupported(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

impl SakuraError {
    /// usacloud reports missing objects as a failed command with a 404 in stderr
    pub fn is_not_found(&self) -> bool {
        match self {
            SakuraError::NotFound(_) => true,
            SakuraError::CommandFailed(stderr) => {
                let stderr = stderr.to_lowercase();
                stderr.contains("404") || stderr.contains("not found")
            }
            _ => false,
        }
    }
}

impl From<SakuraError> for CloudError {
    fn from(err: SakuraError) -> Self {
        match err {
            SakuraError::CloudError(inner) => inner,
            SakuraError::NotFound(id) => CloudError::NotFound(id),
            SakuraError::Unsupported(what) => CloudError::Unsupported(what),
            SakuraError::InvalidZone(_) | SakuraError::InvalidPlan(_) => {
                CloudError::InvalidSpec(err.to_string())
            }
            SakuraError::CommandFailed(_) if err.is_not_found() => {
                CloudError::NotFound(err.to_string())
            }
            SakuraError::CommandFailed(stderr) => CloudError::CommandFailed(stderr),
            SakuraError::IoError(e) => CloudError::Io(e),
            SakuraError::JsonError(e) => CloudError::Json(e),
            SakuraError::UsacloudNotFound => CloudError::Adapter(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SakuraError>;
