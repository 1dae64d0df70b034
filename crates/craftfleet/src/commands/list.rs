use super::orchestrator;
use colored::Colorize;
use craftfleet_cloud::{CancellationToken, ServerProvider, ServerSpec};
use craftfleet_config::Settings;

pub async fn handle(
    spec: &ServerSpec,
    settings: &Settings,
    cancel: &CancellationToken,
    json: bool,
) -> anyhow::Result<()> {
    let servers = orchestrator(spec, settings, cancel)?.list_servers().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&servers)?);
        return Ok(());
    }

    if servers.is_empty() {
        println!(
            "{}",
            format!("No CraftFleet servers on {} ({})", spec.provider, spec.region).dimmed()
        );
        return Ok(());
    }

    println!(
        "{}",
        format!("{:<24} {:<20} {:<12} {}", "ID", "NAME", "EDITION", "ADDRESS").bold()
    );
    for server in &servers {
        println!(
            "{:<24} {:<20} {:<12} {}",
            server.id.to_string().cyan(),
            server.name,
            server.tags.edition().unwrap_or("-"),
            server.public_address.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
