pub mod error;
pub mod settings;

pub use error::*;
pub use settings::Settings;

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub const ENV_MANIFEST: &str = "CRAFTFLEET_MANIFEST";

const CANDIDATES: [&str; 3] = ["craftfleet.local.yaml", "craftfleet.yaml", ".craftfleet.yaml"];

/// CraftFleet's config directory, created on first use
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("craftfleet");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the server manifest
///
/// Search order:
/// 1. `explicit` (the `--manifest` flag); must exist
/// 2. `CRAFTFLEET_MANIFEST` environment variable
/// 3. current directory: craftfleet.local.yaml, craftfleet.yaml, .craftfleet.yaml
/// 4. ./.craftfleet/ directory, same order
/// 5. ~/.config/craftfleet/craftfleet.yaml
pub fn find_manifest(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::ManifestMissing(path.to_path_buf()));
    }

    if let Ok(manifest_path) = std::env::var(ENV_MANIFEST) {
        let path = PathBuf::from(manifest_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points to missing file {}", ENV_MANIFEST, path.display());
    }

    let current_dir = std::env::current_dir()?;
    for dir in [current_dir.clone(), current_dir.join(".craftfleet")] {
        if !dir.is_dir() {
            continue;
        }
        for filename in &CANDIDATES {
            let path = dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("craftfleet").join("craftfleet.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::ManifestNotFound)
}

/// Read and deserialize a YAML document
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
