pub mod create;
pub mod delete;
pub mod get;
pub mod list;
pub mod plugin;
pub mod update;

use crate::progress::SpinnerSink;
use anyhow::Context;
use colored::Colorize;
use craftfleet_cloud::{
    CancellationToken, Orchestrator, OrchestratorOptions, ProviderRegistry, ResourceHandle,
    ResourceId, ServerSpec, TcpProbe,
};
use craftfleet_cloud_sakura::SakuraAdapter;
use craftfleet_config::Settings;
use std::sync::Arc;

/// Adapters this build knows about, bound to the server's region
pub fn registry(spec: &ServerSpec) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(SakuraAdapter::new(&spec.region)));
    registry
}

pub fn options(settings: &Settings) -> OrchestratorOptions {
    OrchestratorOptions {
        poll_interval: settings.poll_interval(),
        create_timeout: settings.create_timeout(),
        delete_timeout: settings.delete_timeout(),
        heartbeat: settings.heartbeat(),
        ..OrchestratorOptions::default()
    }
}

/// Orchestrator for the provider named in `spec`
pub fn orchestrator(
    spec: &ServerSpec,
    settings: &Settings,
    cancel: &CancellationToken,
) -> anyhow::Result<Orchestrator> {
    let adapter = registry(spec).get(&spec.provider)?;
    let prober = TcpProbe::new(
        settings.readiness_attempts,
        settings.readiness_interval(),
        settings.readiness_connect_timeout(),
    );
    Ok(Orchestrator::builder(adapter)
        .prober(Arc::new(prober))
        .sink(Arc::new(SpinnerSink::new()))
        .options(options(settings))
        .cancel(cancel.clone())
        .build()?)
}

pub fn parse_id(raw: &str) -> anyhow::Result<ResourceId> {
    raw.parse()
        .with_context(|| format!("'{}' is not a server identifier", raw))
}

pub fn print_handle(handle: &ResourceHandle) {
    println!("  {:<10} {}", "id".dimmed(), handle.id.to_string().cyan());
    println!("  {:<10} {}", "name".dimmed(), handle.name);
    println!("  {:<10} {}", "region".dimmed(), handle.region);
    println!(
        "  {:<10} {}",
        "address".dimmed(),
        handle.public_address.as_deref().unwrap_or("-")
    );
    if let Some(edition) = handle.tags.edition() {
        println!("  {:<10} {}", "edition".dimmed(), edition);
    }
}
