//! ユーザー設定
//!
//! `~/.config/craftfleet/settings.yaml` から待機時間などを読み込みます。
//! ファイルの項目はすべて省略可能で、一部は環境変数で上書きできます。

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const SETTINGS_FILE: &str = "settings.yaml";
pub const ENV_CREATE_TIMEOUT: &str = "CRAFTFLEET_CREATE_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL: &str = "CRAFTFLEET_POLL_INTERVAL_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub poll_interval_secs: u64,
    pub create_timeout_secs: u64,
    pub delete_timeout_secs: u64,
    pub readiness_attempts: u32,
    pub readiness_interval_secs: u64,
    pub readiness_connect_timeout_secs: u64,
    pub heartbeat_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            create_timeout_secs: 30 * 60,
            delete_timeout_secs: 30 * 60,
            readiness_attempts: 50,
            readiness_interval_secs: 15,
            readiness_connect_timeout_secs: 15,
            heartbeat_secs: 30,
        }
    }
}

impl Settings {
    /// Settings from the user config directory, defaults when the file is absent
    pub fn load() -> Result<Self> {
        let path = crate::get_config_dir()?.join(SETTINGS_FILE);
        let settings = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::debug!("no settings file at {}, using defaults", path.display());
            Self::default()
        };
        settings.with_env_overrides()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(secs) = env_secs(ENV_CREATE_TIMEOUT)? {
            self.create_timeout_secs = secs;
        }
        if let Some(secs) = env_secs(ENV_POLL_INTERVAL)? {
            self.poll_interval_secs = secs;
        }
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_secs(self.readiness_interval_secs)
    }

    pub fn readiness_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_connect_timeout_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

fn env_secs(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
