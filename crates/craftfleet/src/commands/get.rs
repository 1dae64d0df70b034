use super::{orchestrator, parse_id, print_handle};
use craftfleet_cloud::{CancellationToken, ServerProvider, ServerSpec};
use craftfleet_config::Settings;

pub async fn handle(
    spec: &ServerSpec,
    settings: &Settings,
    cancel: &CancellationToken,
    id: &str,
    json: bool,
) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    let handle = orchestrator(spec, settings, cancel)?
        .get_server(&id, spec)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&handle)?);
    } else {
        print_handle(&handle);
    }
    Ok(())
}
