use async_trait::async_trait;
use craftfleet_cloud::{
    Adapter, CancellationToken, CloudError, Edition, MonitoringSpec, OrchestratorOptions,
    PrimitiveKind, PrimitiveRequest, ProgressOutcome, ProgressSink, RconSpec, ReadinessCheck,
    RemoteExecutor, RemoteTarget, ResourceHandle, ResourceId, ResourceStatus, Result, ServerSpec,
    SshSpec, TagSet,
};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Adapter call as recorded by [`MockAdapter`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Call {
    Create(PrimitiveKind, String),
    Destroy(PrimitiveKind, String),
    CancelSpot(String),
    Describe(String),
}

#[derive(Debug, Clone)]
struct Instance {
    name: String,
    region: String,
    tags: TagSet,
    deleted_polls: Option<u32>,
}

#[derive(Default)]
struct MockState {
    next_id: u32,
    calls: Vec<Call>,
    polls: HashMap<String, u32>,
    live: HashMap<String, PrimitiveKind>,
    instances: HashMap<String, Instance>,
    spot_requests: HashMap<String, (String, u32)>,
    last_instance_request: Option<craftfleet_cloud::InstanceRequest>,
}

/// In-memory provider that records every call
pub struct MockAdapter {
    state: Mutex<MockState>,
    /// Status polls answered with `Creating` before an object reports `Running`
    pub pending_polls: u32,
    pub unsupported: HashSet<PrimitiveKind>,
    pub fail_create: Option<PrimitiveKind>,
    pub fail_destroy: Option<PrimitiveKind>,
    pub fixed_ids: HashMap<PrimitiveKind, String>,
    pub address: Option<String>,
}

#[allow(dead_code)]
impl MockAdapter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            pending_polls: 1,
            unsupported: HashSet::new(),
            fail_create: None,
            fail_destroy: None,
            fixed_ids: HashMap::new(),
            address: Some("127.0.0.1".to_string()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn created(&self) -> Vec<(PrimitiveKind, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(kind, id) => Some((kind, id)),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed(&self) -> Vec<(PrimitiveKind, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Destroy(kind, id) => Some((kind, id)),
                _ => None,
            })
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn last_instance_request(&self) -> Option<craftfleet_cloud::InstanceRequest> {
        self.state.lock().unwrap().last_instance_request.clone()
    }

    /// Instance created outside craftfleet (no ownership tag)
    pub fn add_foreign_instance(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        state.instances.insert(
            id.to_string(),
            Instance {
                name: "someone-else".to_string(),
                region: "tk1a".to_string(),
                tags: "team=ops".parse().unwrap(),
                deleted_polls: None,
            },
        );
    }

    fn allocate(&self, state: &mut MockState, kind: PrimitiveKind) -> String {
        if let Some(id) = self.fixed_ids.get(&kind) {
            return id.clone();
        }
        state.next_id += 1;
        let prefix = match kind {
            PrimitiveKind::SshKey => "key",
            PrimitiveKind::Network => "vpc",
            PrimitiveKind::Subnetwork => "subnet",
            PrimitiveKind::Gateway => "igw",
            PrimitiveKind::Route => "rtb",
            PrimitiveKind::SecurityGroup => "sg",
            PrimitiveKind::Volume => "vol",
            PrimitiveKind::Instance => "i",
            PrimitiveKind::SpotRequest => "sir",
        };
        format!("{}-{}", prefix, state.next_id)
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn code(&self) -> &str {
        "mock"
    }

    fn display_name(&self) -> &str {
        "Mock Cloud"
    }

    fn supports(&self, kind: PrimitiveKind) -> bool {
        !self.unsupported.contains(&kind)
    }

    async fn create_primitive(&self, request: &PrimitiveRequest) -> Result<String> {
        let kind = request.kind();
        if self.fail_create == Some(kind) {
            return Err(CloudError::Adapter(format!("quota exceeded for {}", kind)));
        }

        let mut state = self.state.lock().unwrap();
        match request {
            PrimitiveRequest::Instance(req) => {
                state.last_instance_request = Some(req.clone());
                let instance_id = self.allocate(&mut state, PrimitiveKind::Instance);
                state.instances.insert(
                    instance_id.clone(),
                    Instance {
                        name: req.name.clone(),
                        region: req.region.clone(),
                        tags: req.tags.clone(),
                        deleted_polls: None,
                    },
                );
                state.live.insert(instance_id.clone(), PrimitiveKind::Instance);
                if req.spot {
                    let request_id = self.allocate(&mut state, PrimitiveKind::SpotRequest);
                    state
                        .spot_requests
                        .insert(request_id.clone(), (instance_id.clone(), 0));
                    state
                        .calls
                        .push(Call::Create(PrimitiveKind::SpotRequest, request_id.clone()));
                    Ok(request_id)
                } else {
                    state
                        .calls
                        .push(Call::Create(PrimitiveKind::Instance, instance_id.clone()));
                    Ok(instance_id)
                }
            }
            _ => {
                let id = self.allocate(&mut state, kind);
                state.live.insert(id.clone(), kind);
                state.calls.push(Call::Create(kind, id.clone()));
                Ok(id)
            }
        }
    }

    async fn status(&self, kind: PrimitiveKind, id: &str) -> Result<ResourceStatus> {
        let mut state = self.state.lock().unwrap();
        if kind == PrimitiveKind::Instance {
            let deleted_polls = state.instances.get(id).map(|i| i.deleted_polls);
            match deleted_polls {
                None => return Ok(ResourceStatus::Deleted),
                Some(Some(0)) => return Ok(ResourceStatus::Deleted),
                Some(Some(n)) => {
                    if let Some(instance) = state.instances.get_mut(id) {
                        instance.deleted_polls = Some(n - 1);
                    }
                    return Ok(ResourceStatus::Deleting);
                }
                Some(None) => {}
            }
        } else if !state.live.contains_key(id) {
            return Ok(ResourceStatus::Deleted);
        }

        let polls = state.polls.entry(id.to_string()).or_insert(0);
        *polls += 1;
        if *polls > self.pending_polls {
            Ok(ResourceStatus::Running)
        } else {
            Ok(ResourceStatus::Creating)
        }
    }

    async fn destroy_primitive(&self, kind: PrimitiveKind, id: &str) -> Result<()> {
        if self.fail_destroy == Some(kind) {
            return Err(CloudError::Adapter(format!("{} {} is still in use", kind, id)));
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Destroy(kind, id.to_string()));
        if state.live.remove(id).is_none() {
            return Err(CloudError::NotFound(id.to_string()));
        }
        if kind == PrimitiveKind::Instance {
            if let Some(instance) = state.instances.get_mut(id) {
                instance.deleted_polls = Some(1);
            }
        }
        Ok(())
    }

    async fn resolve_spot_request(&self, request_id: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        let (instance_id, polls) = state
            .spot_requests
            .get_mut(request_id)
            .ok_or_else(|| CloudError::NotFound(request_id.to_string()))?;
        *polls += 1;
        if *polls > 1 {
            Ok(Some(instance_id.clone()))
        } else {
            Ok(None)
        }
    }

    async fn cancel_spot_request(&self, request_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CancelSpot(request_id.to_string()));
        state
            .spot_requests
            .remove(request_id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(request_id.to_string()))
    }

    async fn describe(&self, instance_id: &str) -> Result<ResourceHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Describe(instance_id.to_string()));
        let instance = state
            .instances
            .get(instance_id)
            .ok_or_else(|| CloudError::NotFound(instance_id.to_string()))?;
        let mut handle = ResourceHandle::new(
            ResourceId::new(instance_id)?,
            instance.name.clone(),
            instance.region.clone(),
        )
        .with_tags(instance.tags.clone());
        if let Some(address) = &self.address {
            handle = handle.with_address(address.clone());
        }
        Ok(handle)
    }

    async fn list(&self) -> Result<Vec<ResourceHandle>> {
        let state = self.state.lock().unwrap();
        let mut handles = Vec::new();
        for (id, instance) in &state.instances {
            if instance.deleted_polls.is_some() {
                continue;
            }
            handles.push(
                ResourceHandle::new(
                    ResourceId::new(id.clone())?,
                    instance.name.clone(),
                    instance.region.clone(),
                )
                .with_tags(instance.tags.clone()),
            );
        }
        Ok(handles)
    }
}

/// Readiness check that records its invocations
#[derive(Default)]
pub struct RecordingProber {
    pub probes: Mutex<Vec<(String, String, u16)>>,
    pub fail: bool,
}

#[allow(dead_code)]
impl RecordingProber {
    pub fn failing() -> Self {
        Self {
            probes: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }
}

#[async_trait]
impl ReadinessCheck for RecordingProber {
    async fn probe(
        &self,
        server_id: &str,
        address: &str,
        port: u16,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.probes
            .lock()
            .unwrap()
            .push((server_id.to_string(), address.to_string(), port));
        if self.fail {
            return Err(CloudError::ReadinessTimeout {
                id: server_id.to_string(),
                address: address.to_string(),
                port,
                attempts: 50,
            });
        }
        Ok(())
    }
}

/// Remote executor that records scripts and uploads
#[derive(Default)]
pub struct RecordingRemote {
    pub scripts: Mutex<Vec<(RemoteTarget, String)>>,
    pub uploads: Mutex<Vec<(PathBuf, String)>>,
}

#[async_trait]
impl RemoteExecutor for RecordingRemote {
    async fn run_script(&self, target: &RemoteTarget, script: &str) -> Result<String> {
        self.scripts
            .lock()
            .unwrap()
            .push((target.clone(), script.to_string()));
        Ok(String::new())
    }

    async fn upload(&self, _target: &RemoteTarget, source: &Path, destination: &str) -> Result<()> {
        self.uploads
            .lock()
            .unwrap()
            .push((source.to_path_buf(), destination.to_string()));
        Ok(())
    }
}

/// Progress sink that records every event
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

impl ProgressSink for RecordingSink {
    fn start(&self, message: &str) {
        self.events.lock().unwrap().push(format!("start:{}", message));
    }

    fn update(&self, message: &str) {
        self.events.lock().unwrap().push(format!("update:{}", message));
    }

    fn stop(&self, outcome: &ProgressOutcome) {
        let line = match outcome {
            ProgressOutcome::Success(m) => format!("ok:{}", m),
            ProgressOutcome::Failure(m) => format!("err:{}", m),
        };
        self.events.lock().unwrap().push(line);
    }
}

/// Options with millisecond intervals so tests run in real time
pub fn fast_options() -> OrchestratorOptions {
    OrchestratorOptions {
        poll_interval: Duration::from_millis(5),
        create_timeout: Duration::from_secs(10),
        delete_timeout: Duration::from_secs(10),
        heartbeat: Duration::from_secs(3600),
        ..OrchestratorOptions::default()
    }
}

/// Public key file plus a spec pointing at it
pub struct Fixture {
    pub key: NamedTempFile,
    pub spec: ServerSpec,
}

pub fn fixture(edition: Edition) -> Fixture {
    let mut key = NamedTempFile::new().unwrap();
    writeln!(key, "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIMock test@craftfleet").unwrap();
    let spec = ServerSpec {
        name: "survival".to_string(),
        edition,
        version: Some("1.20.4".to_string()),
        provider: "mock".to_string(),
        region: "tk1a".to_string(),
        size: "2core-4gb".to_string(),
        port: None,
        spot: false,
        volume: Some(craftfleet_cloud::VolumeSpec { size_gb: 20 }),
        ssh: SshSpec {
            public_key_file: key.path().to_path_buf(),
            private_key_file: None,
            port: 22,
            user: "root".to_string(),
        },
        rcon: RconSpec::default(),
        monitoring: MonitoringSpec::default(),
    };
    Fixture { key, spec }
}
