use super::{orchestrator, parse_id};
use colored::Colorize;
use craftfleet_cloud::{CancellationToken, ServerProvider, ServerSpec};
use craftfleet_config::Settings;

pub async fn handle(
    spec: &ServerSpec,
    settings: &Settings,
    cancel: &CancellationToken,
    id: &str,
) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    println!(
        "{}",
        format!(
            "Updating '{}' to {} {}...",
            spec.name,
            spec.edition,
            spec.version.as_deref().unwrap_or("latest")
        )
        .yellow()
        .bold()
    );

    orchestrator(spec, settings, cancel)?
        .update_server(&id, spec)
        .await?;

    println!("{}", "✓ Updated".green());
    Ok(())
}
