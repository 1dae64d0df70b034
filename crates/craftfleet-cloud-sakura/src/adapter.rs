//! Sakura Cloud adapter implementation
//!
//! Sakura has no user-managed networks: every server gets a shared upstream
//! NIC, so network, subnetwork, gateway and route steps are skipped. Rule
//! groups map to packet filters, volumes to disks.

use crate::error::SakuraError;
use crate::usacloud::{
    CreateServerParameters, DiskEditParameters, DiskInfo, DiskParameters,
    NetworkInterfaceParameters, PacketFilterExpression, ServerInfo, Usacloud,
};
use async_trait::async_trait;
use craftfleet_cloud::{
    Adapter, CloudError, FirewallRule, InstanceRequest, PrimitiveKind, PrimitiveRequest,
    ResourceHandle, ResourceId, ResourceStatus, Result, TagSet,
};

pub const PROVIDER_CODE: &str = "sakura";

/// Boot disk image and size used for every server
const BOOT_OS_TYPE: &str = "ubuntu2404";
const BOOT_DISK_GB: u32 = 20;

/// Sakura rejects tags longer than this
pub const MAX_TAG_LEN: usize = 32;

/// Parse plan string like "2core-4gb" to (core, memory_gb)
pub fn parse_plan(plan: &str) -> std::result::Result<(u32, u32), SakuraError> {
    let invalid = || SakuraError::InvalidPlan(format!("'{}' (expected e.g. 2core-4gb)", plan));
    let (core, memory) = plan.split_once('-').ok_or_else(invalid)?;
    let core = core
        .trim_end_matches("core")
        .parse::<u32>()
        .map_err(|_| invalid())?;
    let memory = memory
        .trim_end_matches("gb")
        .parse::<u32>()
        .map_err(|_| invalid())?;
    if core == 0 || memory == 0 {
        return Err(invalid());
    }
    Ok((core, memory))
}

fn expression(rule: &FirewallRule) -> PacketFilterExpression {
    PacketFilterExpression {
        protocol: rule.protocol.to_string(),
        // empty source means any
        source_network: if rule.cidr == "0.0.0.0/0" {
            String::new()
        } else {
            rule.cidr.clone()
        },
        destination_port: rule.port.to_string(),
        action: "allow".to_string(),
        description: rule.description.clone(),
    }
}

/// Tag tokens as sent to usacloud, each within the provider limit
fn server_tags(tags: &TagSet) -> Result<Vec<String>> {
    let tokens = tags.tokens();
    if let Some(long) = tokens.iter().find(|t| t.chars().count() > MAX_TAG_LEN) {
        return Err(CloudError::InvalidSpec(format!(
            "tag '{}' exceeds {} characters",
            long, MAX_TAG_LEN
        )));
    }
    Ok(tokens)
}

fn disk_status(disk: &DiskInfo) -> ResourceStatus {
    match disk.availability.as_deref() {
        Some("available") => ResourceStatus::Running,
        Some("migrating") | Some("uploading") | Some("transferring") => ResourceStatus::Creating,
        Some("failed") => ResourceStatus::Error,
        _ => ResourceStatus::Unknown,
    }
}

fn server_status(server: &ServerInfo) -> ResourceStatus {
    match server.availability.as_deref() {
        Some("migrating") => return ResourceStatus::Creating,
        Some("failed") => return ResourceStatus::Error,
        _ => {}
    }
    match server.instance_status.as_deref() {
        Some("up") => ResourceStatus::Running,
        Some("down") => ResourceStatus::Stopped,
        Some("cleaning") => ResourceStatus::Deleting,
        Some(_) => ResourceStatus::Creating,
        None => ResourceStatus::Unknown,
    }
}

fn to_handle(server: ServerInfo, zone: &str) -> Result<ResourceHandle> {
    let mut handle = ResourceHandle::new(ResourceId::new(server.id.clone())?, &server.name, zone)
        .with_tags(TagSet::from_tokens(&server.tags));
    if let Some(ip) = server.ip_address() {
        handle = handle.with_address(ip);
    }
    Ok(handle)
}

/// Sakura Cloud adapter driving the usacloud CLI
pub struct SakuraAdapter {
    usacloud: Usacloud,
}

impl SakuraAdapter {
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            usacloud: Usacloud::new(zone),
        }
    }

    pub fn usacloud(&self) -> &Usacloud {
        &self.usacloud
    }

    fn check_zone(&self, region: &str) -> Result<()> {
        if region != self.usacloud.zone() {
            return Err(SakuraError::InvalidZone(format!(
                "{} (adapter is bound to {})",
                region,
                self.usacloud.zone()
            ))
            .into());
        }
        Ok(())
    }

    /// Sakura attaches one packet filter per NIC, so extra groups are folded into the first
    async fn merged_packet_filter(&self, ids: &[String]) -> Result<Option<String>> {
        let Some((first, rest)) = ids.split_first() else {
            return Ok(None);
        };
        if rest.is_empty() {
            return Ok(Some(first.clone()));
        }

        let mut rules = self.usacloud.get_packet_filter(first).await?.expression;
        for id in rest {
            rules.extend(self.usacloud.get_packet_filter(id).await?.expression);
        }
        tracing::debug!(
            packet_filter = %first,
            rules = rules.len(),
            "merging {} packet filters into one",
            ids.len()
        );
        self.usacloud.update_packet_filter(first, rules).await?;
        Ok(Some(first.clone()))
    }

    async fn create_server(&self, req: &InstanceRequest) -> Result<String> {
        if req.spot {
            return Err(SakuraError::Unsupported("spot instances".to_string()).into());
        }
        self.check_zone(&req.region)?;
        let (cpu, memory_gb) = parse_plan(&req.size)?;
        let tags = server_tags(&req.tags)?;
        let packet_filter_id = self.merged_packet_filter(&req.security_group_ids).await?;

        let parameters = CreateServerParameters {
            name: req.name.clone(),
            cpu,
            memory_gb,
            tags,
            network_interface_driver: "virtio".to_string(),
            network_interfaces: vec![NetworkInterfaceParameters {
                upstream: "shared".to_string(),
                packet_filter_id,
            }],
            disks: vec![DiskParameters {
                name: format!("{}-boot", req.name),
                os_type: BOOT_OS_TYPE.to_string(),
                size_gb: BOOT_DISK_GB,
                edit_parameter: DiskEditParameters {
                    host_name: req.name.clone(),
                    ssh_key_ids: req.ssh_key_id.iter().cloned().collect(),
                    disable_pw_auth: true,
                },
            }],
            disk_ids: req.volume_id.iter().cloned().collect(),
            user_data: req.user_data.clone(),
            boot_after_create: true,
        };

        let server = self.usacloud.create_server(&parameters).await?;
        Ok(server.id)
    }

    /// Delete the server and its boot disk; extra disks are separate graph entries
    async fn destroy_server(&self, id: &str) -> Result<()> {
        let server = self.usacloud.get_server_by_id(id).await?;
        self.usacloud.delete_server(id, false).await?;
        if let Some(boot) = server.disks.first() {
            self.usacloud.delete_disk(&boot.id).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for SakuraAdapter {
    fn code(&self) -> &str {
        PROVIDER_CODE
    }

    fn display_name(&self) -> &str {
        "さくらのクラウド"
    }

    fn supports(&self, kind: PrimitiveKind) -> bool {
        matches!(
            kind,
            PrimitiveKind::SshKey
                | PrimitiveKind::SecurityGroup
                | PrimitiveKind::Volume
                | PrimitiveKind::Instance
        )
    }

    async fn create_primitive(&self, request: &PrimitiveRequest) -> Result<String> {
        tracing::info!(step = %request.kind(), zone = %self.usacloud.zone(), "usacloud create");
        match request {
            PrimitiveRequest::SshKey { name, public_key } => {
                Ok(self.usacloud.create_ssh_key(name, public_key).await?.id)
            }
            PrimitiveRequest::SecurityGroup { name, rules, .. } => {
                let filter = self
                    .usacloud
                    .create_packet_filter(name, rules.iter().map(expression).collect())
                    .await?;
                Ok(filter.id)
            }
            PrimitiveRequest::Volume {
                name,
                region,
                size_gb,
            } => {
                self.check_zone(region)?;
                Ok(self.usacloud.create_disk(name, *size_gb).await?.id)
            }
            PrimitiveRequest::Instance(req) => self.create_server(req).await,
            other => Err(CloudError::Unsupported(format!(
                "{} on Sakura Cloud",
                other.kind()
            ))),
        }
    }

    async fn status(&self, kind: PrimitiveKind, id: &str) -> Result<ResourceStatus> {
        let observed = match kind {
            PrimitiveKind::SshKey => self
                .usacloud
                .get_ssh_key(id)
                .await
                .map(|_| ResourceStatus::Running),
            PrimitiveKind::SecurityGroup => self
                .usacloud
                .get_packet_filter(id)
                .await
                .map(|_| ResourceStatus::Running),
            PrimitiveKind::Volume => self.usacloud.get_disk(id).await.map(|d| disk_status(&d)),
            PrimitiveKind::Instance => self
                .usacloud
                .get_server_by_id(id)
                .await
                .map(|s| server_status(&s)),
            other => {
                return Err(CloudError::Unsupported(format!(
                    "{} on Sakura Cloud",
                    other
                )));
            }
        };
        match observed {
            Ok(status) => Ok(status),
            Err(e) if e.is_not_found() => Ok(ResourceStatus::Deleted),
            Err(e) => Err(e.into()),
        }
    }

    async fn destroy_primitive(&self, kind: PrimitiveKind, id: &str) -> Result<()> {
        tracing::info!(step = %kind, id = %id, "usacloud delete");
        match kind {
            PrimitiveKind::SshKey => Ok(self.usacloud.delete_ssh_key(id).await?),
            PrimitiveKind::SecurityGroup => Ok(self.usacloud.delete_packet_filter(id).await?),
            PrimitiveKind::Volume => Ok(self.usacloud.delete_disk(id).await?),
            PrimitiveKind::Instance => self.destroy_server(id).await,
            other => Err(CloudError::Unsupported(format!(
                "{} on Sakura Cloud",
                other
            ))),
        }
    }

    async fn resolve_spot_request(&self, request_id: &str) -> Result<Option<String>> {
        Err(CloudError::Unsupported(format!(
            "spot request {} (Sakura Cloud has no spot instances)",
            request_id
        )))
    }

    async fn cancel_spot_request(&self, request_id: &str) -> Result<()> {
        Err(CloudError::Unsupported(format!(
            "spot request {} (Sakura Cloud has no spot instances)",
            request_id
        )))
    }

    async fn describe(&self, instance_id: &str) -> Result<ResourceHandle> {
        let server = self.usacloud.get_server_by_id(instance_id).await?;
        to_handle(server, self.usacloud.zone())
    }

    async fn list(&self) -> Result<Vec<ResourceHandle>> {
        let servers = self.usacloud.list_servers().await?;
        servers
            .into_iter()
            .map(|s| to_handle(s, self.usacloud.zone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use craftfleet_cloud::{Protocol, ResourceGraph};

    /// プラン文字列のパースをテスト
    #[test]
    fn test_parse_plan() {
        assert_eq!(parse_plan("2core-4gb").unwrap(), (2, 4));
        assert_eq!(parse_plan("4core-16gb").unwrap(), (4, 16));
        assert!(parse_plan("large").is_err());
        assert!(parse_plan("0core-4gb").is_err());
        assert!(parse_plan("2core-lots").is_err());
    }

    /// さくらのクラウドで扱うリソース種別を確認
    #[test]
    fn test_supported_kinds() {
        let adapter = SakuraAdapter::new("tk1a");
        assert!(adapter.supports(PrimitiveKind::SshKey));
        assert!(adapter.supports(PrimitiveKind::Instance));
        assert!(!adapter.supports(PrimitiveKind::Network));
        assert!(!adapter.supports(PrimitiveKind::Route));
        assert!(!adapter.supports(PrimitiveKind::SpotRequest));
    }

    /// 作成されうる最大のグラフでもタグが上限に収まる
    #[test]
    fn test_graph_tags_fit_tag_limit() {
        let mut graph = ResourceGraph::new();
        graph.push(PrimitiveKind::SshKey, "113000000002");
        for n in 0..10 {
            graph.push(PrimitiveKind::SecurityGroup, format!("11300000010{}", n));
        }
        graph.push(PrimitiveKind::Volume, "113000000200");

        let mut tags = TagSet::owned("powernukkit");
        graph.write_tags(&mut tags).unwrap();

        let tokens = server_tags(&tags).unwrap();
        assert_eq!(tokens.len(), graph.len() + 2);
        for token in &tokens {
            assert!(token.len() <= MAX_TAG_LEN, "{} is {} chars", token, token.len());
        }
    }

    /// 上限を超えるタグはサーバー作成前に拒否する
    #[tokio::test]
    async fn test_long_tag_is_rejected_before_create() {
        let mut tags = TagSet::owned("paper");
        tags.insert("graph.0.sg", "x".repeat(MAX_TAG_LEN)).unwrap();
        assert!(matches!(server_tags(&tags), Err(CloudError::InvalidSpec(_))));

        let adapter = SakuraAdapter::new("tk1a");
        let request = PrimitiveRequest::Instance(InstanceRequest {
            name: "survival".into(),
            region: "tk1a".into(),
            size: "2core-4gb".into(),
            user_data: String::new(),
            ssh_key_id: None,
            subnetwork_id: None,
            security_group_ids: Vec::new(),
            volume_id: None,
            tags,
            spot: false,
        });
        let err = adapter.create_primitive(&request).await.unwrap_err();
        assert!(matches!(err, CloudError::InvalidSpec(_)));
    }

    /// ルールからパケットフィルタ式への変換を確認
    #[test]
    fn test_rule_expression() {
        let rule = FirewallRule::public(Protocol::Udp, 19132, "bedrock");
        let expr = expression(&rule);
        assert_eq!(expr.protocol, "udp");
        assert_eq!(expr.source_network, "");
        assert_eq!(expr.destination_port, "19132");
        assert_eq!(expr.action, "allow");

        let mut rule = FirewallRule::public(Protocol::Tcp, 22, "ssh");
        rule.cidr = "198.51.100.0/24".to_string();
        assert_eq!(expression(&rule).source_network, "198.51.100.0/24");
    }

    /// サーバー状態の対応付けを確認
    #[test]
    fn test_server_status_mapping() {
        let server = |availability: &str, instance: Option<&str>| ServerInfo {
            id: "1".into(),
            name: "s".into(),
            cpu: None,
            memory_mb: None,
            instance_status: instance.map(String::from),
            availability: Some(availability.into()),
            tags: Vec::new(),
            interfaces: None,
            disks: Vec::new(),
        };
        assert_eq!(server_status(&server("available", Some("up"))), ResourceStatus::Running);
        assert_eq!(server_status(&server("available", Some("down"))), ResourceStatus::Stopped);
        assert_eq!(server_status(&server("migrating", None)), ResourceStatus::Creating);
        assert_eq!(server_status(&server("failed", Some("down"))), ResourceStatus::Error);
        assert_eq!(
            server_status(&server("available", Some("cleaning"))),
            ResourceStatus::Deleting
        );
    }

    /// ディスク状態の対応付けを確認
    #[test]
    fn test_disk_status_mapping() {
        let disk = |availability: &str| DiskInfo {
            id: "1".into(),
            name: "d".into(),
            size_mb: Some(20480),
            availability: Some(availability.into()),
        };
        assert_eq!(disk_status(&disk("available")), ResourceStatus::Running);
        assert_eq!(disk_status(&disk("migrating")), ResourceStatus::Creating);
        assert_eq!(disk_status(&disk("failed")), ResourceStatus::Error);
    }

    /// ハンドルにタグとIPアドレスが入ることを確認
    #[test]
    fn test_handle_carries_tags_and_address() {
        let server: ServerInfo = serde_json::from_str(
            r#"{
                "ID": "113000000001",
                "Name": "survival",
                "InstanceStatus": "up",
                "Tags": ["craftfleet", "edition=paper", "graph.0.key=113000000002"],
                "Interfaces": [{"IPAddress": "203.0.113.10"}]
            }"#,
        )
        .unwrap();
        let handle = to_handle(server, "is1b").unwrap();
        assert!(handle.tags.is_owned());
        assert_eq!(handle.tags.edition(), Some("paper"));
        assert_eq!(handle.region, "is1b");
        assert_eq!(handle.public_address.as_deref(), Some("203.0.113.10"));
    }

    /// スポットインスタンスは未対応であることを確認
    #[tokio::test]
    async fn test_spot_is_unsupported() {
        let adapter = SakuraAdapter::new("tk1a");
        let err = adapter.resolve_spot_request("sir-1").await.unwrap_err();
        assert!(matches!(err, CloudError::Unsupported(_)));
    }

    /// ゾーン不一致はコマンド実行前に拒否されることを確認
    #[tokio::test]
    async fn test_zone_mismatch_is_rejected_before_any_command() {
        let adapter = SakuraAdapter::new("tk1a");
        let request = PrimitiveRequest::Volume {
            name: "data".into(),
            region: "is1b".into(),
            size_gb: 20,
        };
        let err = adapter.create_primitive(&request).await.unwrap_err();
        assert!(matches!(err, CloudError::InvalidSpec(_)));
    }
}
