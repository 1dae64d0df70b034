use anyhow::{Context, bail};
use craftfleet_cloud::ServerSpec;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Servers declared in craftfleet.yaml
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub servers: Vec<ServerSpec>,

    #[serde(skip)]
    pub path: PathBuf,
}

impl Manifest {
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = craftfleet_config::find_manifest(explicit)?;
        let mut manifest: Manifest = craftfleet_config::load_yaml(&path)?;
        manifest.path = path;

        for spec in &mut manifest.servers {
            spec.ssh.public_key_file = expand_home(&spec.ssh.public_key_file);
            spec.ssh.private_key_file = spec.ssh.private_key_file.as_deref().map(expand_home);
        }
        for spec in &manifest.servers {
            spec.validate()
                .with_context(|| format!("server '{}' in {}", spec.name, manifest.path.display()))?;
        }
        Ok(manifest)
    }

    /// Resolve a server by name; the name may be omitted when only one is declared
    pub fn select(&self, name: Option<&str>) -> anyhow::Result<&ServerSpec> {
        match name {
            Some(name) => self
                .servers
                .iter()
                .find(|s| s.name == name)
                .with_context(|| {
                    format!(
                        "server '{}' is not declared in {} (available: {})",
                        name,
                        self.path.display(),
                        self.names().join(", ")
                    )
                }),
            None => match self.servers.as_slice() {
                [only] => Ok(only),
                [] => bail!("{} declares no servers", self.path.display()),
                _ => bail!(
                    "{} declares several servers, pick one with --server ({})",
                    self.path.display(),
                    self.names().join(", ")
                ),
            },
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }
}

/// `~/...` key paths as written in manifests
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
