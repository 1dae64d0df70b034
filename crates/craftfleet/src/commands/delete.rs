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
        format!("Deleting server '{}' ({})...", spec.name, id)
            .yellow()
            .bold()
    );
    if let Some(request) = id.secondary() {
        println!("  spot request {} will be cancelled first", request.cyan());
    }

    orchestrator(spec, settings, cancel)?
        .delete_server(&id, spec)
        .await?;

    println!("{}", "✓ Deleted".green());
    Ok(())
}
