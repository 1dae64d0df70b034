use super::{orchestrator, print_handle};
use colored::Colorize;
use craftfleet_cloud::{CancellationToken, CloudError, ResourceHandle, ServerProvider, ServerSpec};
use craftfleet_cloud_sakura::{PROVIDER_CODE, Usacloud};
use craftfleet_config::Settings;

pub async fn handle(
    spec: &ServerSpec,
    settings: &Settings,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    println!(
        "{}",
        format!("Creating {} server '{}'...", spec.edition, spec.name)
            .yellow()
            .bold()
    );
    println!("  provider: {} ({})", spec.provider.cyan(), spec.region);
    println!("  size:     {}", spec.size);
    println!("  port:     {}/{}", spec.game_port(), spec.protocol());

    if spec.provider == PROVIDER_CODE {
        let auth = Usacloud::new(&spec.region).check_auth().await?;
        if let Some(account) = auth.account {
            println!("  account:  {} ({})", account.name, account.id);
        }
    }
    println!();

    let orchestrator = orchestrator(spec, settings, cancel)?;
    match orchestrator.create_server(spec).await {
        Ok(handle) => {
            println!();
            println!("{}", "Server is ready".green().bold());
            print_handle(&handle);
            print_next_steps(spec, &handle);
            Ok(())
        }
        Err(CloudError::ReadinessTimeout { id, .. }) => {
            eprintln!();
            eprintln!(
                "{}",
                "The server was created but never accepted connections.".red()
            );
            eprintln!("Inspect it, or remove it with:");
            eprintln!("  craftfleet delete {} --server {}", id, spec.name);
            anyhow::bail!("server {} is not reachable", id)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_next_steps(spec: &ServerSpec, handle: &ResourceHandle) {
    println!();
    println!("{}", "Next steps:".bold());
    if let Some(address) = &handle.public_address {
        println!("  connect:  {}:{}", address, spec.game_port());
    }
    println!(
        "  inspect:  craftfleet get {} --server {}",
        handle.id, spec.name
    );
    println!(
        "  update:   craftfleet update {} --server {}",
        handle.id, spec.name
    );
    println!(
        "  delete:   craftfleet delete {} --server {}",
        handle.id, spec.name
    );
}
