use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Manifest not found. Looked in:\n\
        - current directory: craftfleet.local.yaml, craftfleet.yaml, .craftfleet.yaml\n\
        - ./.craftfleet/ directory\n\
        - ~/.config/craftfleet/craftfleet.yaml\n\
        Set CRAFTFLEET_MANIFEST or pass --manifest to use another path"
    )]
    ManifestNotFound,

    #[error("Manifest does not exist: {0}")]
    ManifestMissing(PathBuf),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value for {name}: '{value}' (expected a number of seconds)")]
    InvalidEnv { name: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
