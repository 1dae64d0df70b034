//! Server lifecycle orchestration
//!
//! Sequences adapter primitives into create/delete/update/inspect. Every
//! step completes (including its status poll) before the next one starts.
//! Nothing is rolled back: a failed create leaves what it built, a failed
//! delete leaves what it had not reached yet. Both log the affected ids so
//! the leftovers can be cleaned up by hand or by re-running delete.

use crate::adapter::{Adapter, FirewallRule, InstanceRequest, PrimitiveRequest, ResourceStatus};
use crate::bootstrap::{BootstrapRenderer, SERVICE_NAME, TemplateRenderer};
use crate::error::{CloudError, Result};
use crate::graph::{PrimitiveKind, ResourceGraph};
use crate::handle::ResourceHandle;
use crate::identifier::ResourceId;
use crate::probe::{ReadinessCheck, TcpProbe};
use crate::progress::{
    DEFAULT_HEARTBEAT, ProgressOutcome, ProgressSession, ProgressSink, TracingSink,
};
use crate::provider::ServerProvider;
use crate::remote::{RemoteExecutor, RemoteTarget, SshExecutor};
use crate::spec::{Protocol, ServerSpec};
use crate::tags::TagSet;
use crate::waiter::{DEFAULT_CREATE_TIMEOUT, DEFAULT_POLL_INTERVAL, Deadline, Waiter};
use async_trait::async_trait;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timing and network layout knobs
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Interval between provider status polls
    pub poll_interval: Duration,

    /// Bound on the whole create sequence (readiness excluded)
    pub create_timeout: Duration,

    /// Bound on the whole delete sequence
    pub delete_timeout: Duration,

    /// Cadence of "still working" progress updates
    pub heartbeat: Duration,

    pub network_cidr: String,
    pub subnetwork_cidr: String,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            create_timeout: DEFAULT_CREATE_TIMEOUT,
            delete_timeout: DEFAULT_CREATE_TIMEOUT,
            heartbeat: DEFAULT_HEARTBEAT,
            network_cidr: "172.16.0.0/16".to_string(),
            subnetwork_cidr: "172.16.10.0/24".to_string(),
        }
    }
}

/// Lifecycle engine bound to one adapter
pub struct Orchestrator {
    adapter: Arc<dyn Adapter>,
    renderer: Arc<dyn BootstrapRenderer>,
    remote: Arc<dyn RemoteExecutor>,
    prober: Arc<dyn ReadinessCheck>,
    sink: Arc<dyn ProgressSink>,
    options: OrchestratorOptions,
    cancel: CancellationToken,
}

/// Builder for [`Orchestrator`]; unset collaborators fall back to the defaults
pub struct OrchestratorBuilder {
    adapter: Arc<dyn Adapter>,
    renderer: Option<Arc<dyn BootstrapRenderer>>,
    remote: Option<Arc<dyn RemoteExecutor>>,
    prober: Option<Arc<dyn ReadinessCheck>>,
    sink: Option<Arc<dyn ProgressSink>>,
    options: OrchestratorOptions,
    cancel: CancellationToken,
}

impl OrchestratorBuilder {
    pub fn renderer(mut self, renderer: Arc<dyn BootstrapRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteExecutor>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn prober(mut self, prober: Arc<dyn ReadinessCheck>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Token that aborts in-flight waits when cancelled (e.g. on Ctrl-C)
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let renderer = match self.renderer {
            Some(r) => r,
            None => Arc::new(TemplateRenderer::builtin()?),
        };
        Ok(Orchestrator {
            adapter: self.adapter,
            renderer,
            remote: self.remote.unwrap_or_else(|| Arc::new(SshExecutor::new())),
            prober: self.prober.unwrap_or_else(|| Arc::new(TcpProbe::default())),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            options: self.options,
            cancel: self.cancel,
        })
    }
}

impl Orchestrator {
    pub fn builder(adapter: Arc<dyn Adapter>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            adapter,
            renderer: None,
            remote: None,
            prober: None,
            sink: None,
            options: OrchestratorOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    fn check_provider(&self, spec: &ServerSpec) -> Result<()> {
        if spec.provider != self.adapter.code() {
            return Err(CloudError::InvalidSpec(format!(
                "server '{}' targets provider '{}' but this orchestrator drives '{}'",
                spec.name,
                spec.provider,
                self.adapter.code()
            )));
        }
        Ok(())
    }

    /// Run `op` inside a progress session, stopping it with the matching outcome
    async fn with_progress<T, Fut>(
        &self,
        start: String,
        done: impl FnOnce(&T) -> String,
        op: impl FnOnce(Arc<ProgressSession>) -> Fut,
    ) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let session = Arc::new(ProgressSession::start(
            self.sink.clone(),
            &start,
            self.options.heartbeat,
        ));
        let result = op(session.clone()).await;
        let outcome = match &result {
            Ok(value) => ProgressOutcome::Success(done(value)),
            Err(e) => ProgressOutcome::Failure(e.to_string()),
        };
        session.stop(outcome).await;
        result
    }

    /// Poll an object until it reaches `target`
    async fn wait_for(
        &self,
        kind: PrimitiveKind,
        id: &str,
        target: ResourceStatus,
        deadline: &Deadline,
    ) -> Result<()> {
        let adapter = self.adapter.as_ref();
        let operation = format!("{} {} to be {}", kind, id, target);
        Waiter::within(self.options.poll_interval, deadline)
            .wait(&operation, &self.cancel, move || {
                poll_status(adapter, kind, id, target)
            })
            .await
    }

    /// Create one primitive, record it and wait until it is available
    async fn create_step(
        &self,
        request: PrimitiveRequest,
        deadline: &Deadline,
        graph: &mut ResourceGraph,
        session: &ProgressSession,
    ) -> Result<Option<String>> {
        let kind = request.kind();
        if !self.adapter.supports(kind) {
            tracing::debug!(step = %kind, "provider has no {}, skipping", kind);
            return Ok(None);
        }

        session.update(&format!("Creating {}", kind));
        let id = deadline
            .guard(
                &format!("creating {}", kind),
                &self.cancel,
                self.adapter.create_primitive(&request),
            )
            .await
            .inspect_err(|e| tracing::error!(step = %kind, error = %e, "create step failed"))?;
        graph.push(kind, id.clone());

        self.wait_for(kind, &id, ResourceStatus::Running, deadline)
            .await
            .inspect_err(|e| {
                tracing::error!(step = %kind, id = %id, error = %e, "create step failed")
            })?;

        tracing::info!(step = %kind, id = %id, "created");
        Ok(Some(id))
    }

    fn security_groups(spec: &ServerSpec) -> Vec<(&'static str, FirewallRule)> {
        let mut groups = vec![
            ("ssh", FirewallRule::public(Protocol::Tcp, spec.ssh.port, "ssh")),
            (
                "game",
                FirewallRule::public(spec.protocol(), spec.game_port(), spec.edition.as_str()),
            ),
        ];
        if spec.rcon.enabled {
            groups.push(("rcon", FirewallRule::public(Protocol::Tcp, spec.rcon.port, "rcon")));
        }
        if spec.monitoring.enabled {
            groups.push((
                "metrics",
                FirewallRule::public(Protocol::Tcp, spec.monitoring.port, "metrics"),
            ));
        }
        groups
    }

    /// Infrastructure part of create: everything up to a running instance
    async fn provision(
        &self,
        spec: &ServerSpec,
        deadline: &Deadline,
        graph: &mut ResourceGraph,
        session: &ProgressSession,
    ) -> Result<ResourceHandle> {
        // 1. access key
        let public_key = tokio::fs::read_to_string(&spec.ssh.public_key_file)
            .await
            .map_err(|source| CloudError::PublicKey {
                path: spec.ssh.public_key_file.clone(),
                source,
            })?;
        let key_id = self
            .create_step(
                PrimitiveRequest::SshKey {
                    name: format!("{}-ssh", spec.name),
                    public_key: public_key.trim().to_string(),
                },
                deadline,
                graph,
                session,
            )
            .await?;

        // 2. network and subnetwork
        let network_id = self
            .create_step(
                PrimitiveRequest::Network {
                    name: format!("{}-vpc", spec.name),
                    cidr: self.options.network_cidr.clone(),
                },
                deadline,
                graph,
                session,
            )
            .await?;

        let subnetwork_id = match &network_id {
            Some(network_id) => {
                self.create_step(
                    PrimitiveRequest::Subnetwork {
                        name: format!("{}-subnet", spec.name),
                        network_id: network_id.clone(),
                        cidr: self.options.subnetwork_cidr.clone(),
                        region: spec.region.clone(),
                    },
                    deadline,
                    graph,
                    session,
                )
                .await?
            }
            None => None,
        };

        // 3. internet path
        let gateway_id = match &network_id {
            Some(network_id) => {
                self.create_step(
                    PrimitiveRequest::Gateway {
                        name: format!("{}-igw", spec.name),
                        network_id: network_id.clone(),
                    },
                    deadline,
                    graph,
                    session,
                )
                .await?
            }
            None => None,
        };

        if let (Some(network_id), Some(subnetwork_id), Some(gateway_id)) =
            (&network_id, &subnetwork_id, &gateway_id)
        {
            self.create_step(
                PrimitiveRequest::Route {
                    network_id: network_id.clone(),
                    subnetwork_id: subnetwork_id.clone(),
                    gateway_id: gateway_id.clone(),
                },
                deadline,
                graph,
                session,
            )
            .await?;
        }

        // 4. access-control rule groups
        let mut security_group_ids = Vec::new();
        for (suffix, rule) in Self::security_groups(spec) {
            let id = self
                .create_step(
                    PrimitiveRequest::SecurityGroup {
                        name: format!("{}-{}", spec.name, suffix),
                        network_id: network_id.clone(),
                        rules: vec![rule],
                    },
                    deadline,
                    graph,
                    session,
                )
                .await?;
            security_group_ids.extend(id);
        }

        // 5. storage
        let volume_id = match &spec.volume {
            Some(volume) => {
                self.create_step(
                    PrimitiveRequest::Volume {
                        name: format!("{}-data", spec.name),
                        region: spec.region.clone(),
                        size_gb: volume.size_gb,
                    },
                    deadline,
                    graph,
                    session,
                )
                .await?
            }
            None => None,
        };

        // 6. bootstrap payload
        let user_data = self.renderer.render_bootstrap(spec)?;

        // 7. instance, tagged with ownership, edition and its dependency graph
        let mut tags = TagSet::owned(spec.edition.as_str());
        graph.write_tags(&mut tags)?;
        let request = PrimitiveRequest::Instance(InstanceRequest {
            name: spec.name.clone(),
            region: spec.region.clone(),
            size: spec.size.clone(),
            user_data,
            ssh_key_id: key_id,
            subnetwork_id,
            security_group_ids,
            volume_id,
            tags,
            spot: spec.spot,
        });

        session.update(&format!("Creating {} server '{}'", spec.edition, spec.name));
        let submitted = deadline
            .guard("creating instance", &self.cancel, self.adapter.create_primitive(&request))
            .await
            .inspect_err(|e| tracing::error!(step = "instance", error = %e, "create step failed"))?;

        // 9. spot requests resolve to an instance asynchronously
        let (instance_id, id) = if spec.spot {
            session.update(&format!("Waiting for spot request {}", submitted));
            let adapter = &self.adapter;
            let request_id = submitted.as_str();
            let instance_id = Waiter::within(self.options.poll_interval, deadline)
                .wait(
                    &format!("spot request {} to be fulfilled", request_id),
                    &self.cancel,
                    move || async move { adapter.resolve_spot_request(request_id).await },
                )
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        step = "spot-request",
                        id = %request_id,
                        error = %e,
                        "create step failed"
                    )
                })?;
            let id = ResourceId::composite(instance_id.clone(), submitted.clone())?;
            (instance_id, id)
        } else {
            let id = ResourceId::new(submitted.clone())?;
            (submitted.clone(), id)
        };
        graph.push(PrimitiveKind::Instance, instance_id.clone());

        // 8. running at the infrastructure level
        session.update(&format!("Waiting for instance {} to start", instance_id));
        self.wait_for(PrimitiveKind::Instance, &instance_id, ResourceStatus::Running, deadline)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    step = "instance",
                    id = %instance_id,
                    error = %e,
                    "create step failed"
                )
            })?;

        let handle = deadline
            .guard(
                "describing instance",
                &self.cancel,
                self.adapter.describe(&instance_id),
            )
            .await?;
        tracing::info!(step = "instance", id = %id, "created");
        Ok(handle.with_id(id))
    }

    fn remote_target(spec: &ServerSpec, handle: &ResourceHandle) -> Result<RemoteTarget> {
        let address = handle.public_address.clone().ok_or_else(|| {
            CloudError::NotFound(format!("public address of server {}", handle.id))
        })?;
        Ok(RemoteTarget {
            address,
            port: spec.ssh.port,
            user: spec.ssh.user.clone(),
            identity_file: spec.ssh.private_key_file.clone(),
        })
    }

    async fn teardown(&self, id: &ResourceId, session: &ProgressSession) -> Result<()> {
        let deadline = Deadline::after(self.options.delete_timeout);
        let instance_id = id.primary();

        // Spot request first so the provider does not relaunch the instance
        if let Some(request_id) = id.secondary() {
            session.update(&format!("Cancelling spot request {}", request_id));
            deadline
                .guard(
                    "cancelling spot request",
                    &self.cancel,
                    self.adapter.cancel_spot_request(request_id),
                )
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        step = "spot-request",
                        id = %request_id,
                        error = %e,
                        "delete step failed"
                    )
                })?;
            tracing::info!(step = "spot-request", id = %request_id, "cancelled");
        }

        let handle = deadline
            .guard("describing instance", &self.cancel, self.adapter.describe(instance_id))
            .await?;
        let mut graph = ResourceGraph::from_tags(&handle.tags)?;
        graph.push(PrimitiveKind::Instance, instance_id);

        let order: Vec<_> = graph.teardown_order().cloned().collect();
        for (done, entry) in order.iter().enumerate() {
            session.update(&format!("Deleting {} {}", entry.kind, entry.id));
            let result = async {
                deadline
                    .guard(
                        &format!("deleting {}", entry.kind),
                        &self.cancel,
                        self.adapter.destroy_primitive(entry.kind, &entry.id),
                    )
                    .await?;
                if entry.kind == PrimitiveKind::Instance {
                    self.wait_for(entry.kind, &entry.id, ResourceStatus::Deleted, &deadline)
                        .await?;
                }
                Ok::<_, CloudError>(())
            }
            .await;

            if let Err(e) = result {
                let remaining: Vec<String> = order[done..]
                    .iter()
                    .map(|r| format!("{}={}", r.kind, r.id))
                    .collect();
                tracing::error!(
                    step = %entry.kind,
                    id = %entry.id,
                    error = %e,
                    remaining = %remaining.join(","),
                    "delete step failed; remaining resources left in place"
                );
                return Err(e);
            }
            tracing::info!(step = %entry.kind, id = %entry.id, "deleted");
        }
        Ok(())
    }
}

async fn poll_status(
    adapter: &dyn Adapter,
    kind: PrimitiveKind,
    id: &str,
    target: ResourceStatus,
) -> Result<Option<()>> {
    let status = adapter.status(kind, id).await?;
    if status == target {
        return Ok(Some(()));
    }
    match status {
        ResourceStatus::Error => Err(CloudError::Adapter(format!(
            "{} {} entered error state",
            kind, id
        ))),
        ResourceStatus::Deleted => Err(CloudError::Adapter(format!(
            "{} {} disappeared while waiting",
            kind, id
        ))),
        _ => Ok(None),
    }
}

#[async_trait]
impl ServerProvider for Orchestrator {
    async fn create_server(&self, spec: &ServerSpec) -> Result<ResourceHandle> {
        spec.validate()?;
        self.check_provider(spec)?;

        let start = format!(
            "Creating {} server '{}' on {} ({})",
            spec.edition,
            spec.name,
            self.adapter.display_name(),
            spec.region
        );
        self.with_progress(
            start,
            |handle: &ResourceHandle| format!("Server '{}' is ready ({})", handle.name, handle.id),
            |session| async move {
                let mut graph = ResourceGraph::new();
                let deadline = Deadline::after(self.options.create_timeout);
                let handle = match self.provision(spec, &deadline, &mut graph, &session).await {
                    Ok(handle) => handle,
                    Err(e) => {
                        if !graph.is_empty() {
                            let created: Vec<String> = graph
                                .entries()
                                .iter()
                                .map(|r| format!("{}={}", r.kind, r.id))
                                .collect();
                            tracing::error!(
                                server = %spec.name,
                                created = %created.join(","),
                                "create aborted; created resources were left in place"
                            );
                        }
                        return Err(e);
                    }
                };

                if spec.protocol() == Protocol::Tcp {
                    let target = Self::remote_target(spec, &handle)?;
                    session.update(&format!(
                        "Waiting for {}:{} to accept connections",
                        target.address,
                        spec.game_port()
                    ));
                    self.prober
                        .probe(
                            &handle.id.to_string(),
                            &target.address,
                            spec.game_port(),
                            &self.cancel,
                        )
                        .await?;
                } else {
                    tracing::debug!(
                        "{} uses {}, skipping readiness probe",
                        spec.edition,
                        spec.protocol()
                    );
                }
                Ok(handle)
            },
        )
        .await
    }

    async fn delete_server(&self, id: &ResourceId, spec: &ServerSpec) -> Result<()> {
        self.check_provider(spec)?;
        self.with_progress(
            format!("Deleting server '{}' ({})", spec.name, id),
            |_| format!("Server '{}' deleted", spec.name),
            |session| async move { self.teardown(id, &session).await },
        )
        .await
    }

    async fn update_server(&self, id: &ResourceId, spec: &ServerSpec) -> Result<()> {
        self.check_provider(spec)?;
        self.with_progress(
            format!("Updating server '{}' ({})", spec.name, id),
            |_| format!("Server '{}' updated", spec.name),
            |_session| async move {
                let handle = self.get_server(id, spec).await?;
                let target = Self::remote_target(spec, &handle)?;
                let script = self.renderer.render_update(spec)?;
                self.remote.run_script(&target, &script).await?;
                Ok(())
            },
        )
        .await
    }

    async fn upload_plugin(
        &self,
        id: &ResourceId,
        spec: &ServerSpec,
        source: &Path,
        destination: &str,
    ) -> Result<()> {
        self.check_provider(spec)?;
        self.with_progress(
            format!("Uploading {} to '{}'", source.display(), spec.name),
            |_| format!("Plugin uploaded to '{}'", spec.name),
            |session| async move {
                let handle = self.get_server(id, spec).await?;
                let target = Self::remote_target(spec, &handle)?;
                self.remote.upload(&target, source, destination).await?;
                session.update(&format!("Restarting {}", SERVICE_NAME));
                self.remote
                    .run_script(&target, &format!("systemctl restart {}.service\n", SERVICE_NAME))
                    .await?;
                Ok(())
            },
        )
        .await
    }

    async fn list_servers(&self) -> Result<Vec<ResourceHandle>> {
        let servers = self.adapter.list().await?;
        Ok(servers.into_iter().filter(|h| h.tags.is_owned()).collect())
    }

    async fn get_server(&self, id: &ResourceId, spec: &ServerSpec) -> Result<ResourceHandle> {
        self.check_provider(spec)?;
        let handle = self.adapter.describe(id.primary()).await?;
        Ok(handle.with_id(id.clone()))
    }
}
