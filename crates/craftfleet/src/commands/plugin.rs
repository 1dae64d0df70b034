use super::{orchestrator, parse_id};
use anyhow::bail;
use colored::Colorize;
use craftfleet_cloud::bootstrap::SERVER_DIR;
use craftfleet_cloud::{CancellationToken, Edition, ServerProvider, ServerSpec};
use craftfleet_config::Settings;
use std::path::Path;

/// `mods/` for mod loaders, `plugins/` for everything else
pub fn default_destination(spec: &ServerSpec) -> String {
    let dir = match spec.edition {
        Edition::Fabric | Edition::Forge => "mods",
        _ => "plugins",
    };
    format!("{}/{}/", SERVER_DIR, dir)
}

pub async fn handle(
    spec: &ServerSpec,
    settings: &Settings,
    cancel: &CancellationToken,
    id: &str,
    file: &Path,
    destination: Option<&str>,
) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    if !file.is_file() {
        bail!("plugin file not found: {}", file.display());
    }
    let destination = destination
        .map(str::to_string)
        .unwrap_or_else(|| default_destination(spec));

    println!(
        "{}",
        format!("Uploading {} to {}:{}", file.display(), spec.name, destination)
            .yellow()
            .bold()
    );

    orchestrator(spec, settings, cancel)?
        .upload_plugin(&id, spec, file, &destination)
        .await?;

    println!("{}", "✓ Uploaded, server restarted".green());
    Ok(())
}
