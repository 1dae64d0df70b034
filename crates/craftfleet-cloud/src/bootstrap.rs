//! Bootstrap and update payload rendering
//!
//! The instance is configured by a cloud-init payload rendered from the
//! server spec. Updates reuse the same context to render a shell script that
//! is run over SSH.

use crate::error::Result;
use crate::spec::ServerSpec;
use tera::{Context, Tera};

const BOOTSTRAP_TEMPLATE: &str = "bootstrap";
const UPDATE_TEMPLATE: &str = "update";

/// Systemd unit the workload runs under
pub const SERVICE_NAME: &str = "craftfleet";

/// Directory the workload lives in on the instance
pub const SERVER_DIR: &str = "/opt/craftfleet";

/// Built-in cloud-init payload
pub const DEFAULT_BOOTSTRAP: &str = r#"#cloud-config
users:
  - default
package_update: true
packages:
  - curl
  - unzip
{%- if protocol == "tcp" %}
  - openjdk-21-jre-headless
{%- endif %}
write_files:
  - path: /etc/systemd/system/{{ service }}.service
    content: |
      [Unit]
      Description=CraftFleet {{ edition }} server {{ name }}
      After=network-online.target
      [Service]
      WorkingDirectory={{ server_dir }}
{%- if protocol == "udp" %}
      ExecStart={{ server_dir }}/start.sh
{%- else %}
      ExecStart=/usr/bin/java -jar {{ server_dir }}/server.jar nogui
{%- endif %}
      Restart=always
      [Install]
      WantedBy=multi-user.target
  - path: {{ server_dir }}/server.properties
    content: |
      server-port={{ port }}
{%- if rcon_enabled %}
      enable-rcon=true
      rcon.port={{ rcon_port }}
      rcon.password={{ rcon_password }}
      broadcast-rcon-to-ops={{ rcon_broadcast }}
{%- endif %}
  - path: {{ server_dir }}/eula.txt
    content: |
      eula=true
runcmd:
{%- if volume %}
  - mkfs.ext4 -F /dev/disk/by-id/*-craftfleet-data || true
  - mkdir -p {{ server_dir }}
  - mount /dev/disk/by-id/*-craftfleet-data {{ server_dir }} || true
{%- endif %}
  - curl -fsSL -o /tmp/install.sh https://get.craftfleet.dev/{{ edition }}/{{ version }}/install.sh
  - bash /tmp/install.sh {{ server_dir }}
{%- if monitoring_enabled %}
  - curl -fsSL https://get.craftfleet.dev/monitoring/install.sh | bash -s -- {{ metrics_port }}
{%- endif %}
  - systemctl daemon-reload
  - systemctl enable --now {{ service }}.service
"#;

/// Built-in update script
pub const DEFAULT_UPDATE: &str = r#"#!/bin/bash
set -e
systemctl stop {{ service }}.service
curl -fsSL -o /tmp/install.sh https://get.craftfleet.dev/{{ edition }}/{{ version }}/install.sh
bash /tmp/install.sh {{ server_dir }}
systemctl start {{ service }}.service
"#;

/// Produces the payloads the orchestrator ships to instances
pub trait BootstrapRenderer: Send + Sync {
    /// cloud-init user data for a fresh instance
    fn render_bootstrap(&self, spec: &ServerSpec) -> Result<String>;

    /// Shell script applying an edition-specific update in place
    fn render_update(&self, spec: &ServerSpec) -> Result<String>;
}

/// Tera-backed renderer
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Renderer with the built-in templates
    pub fn builtin() -> Result<Self> {
        Self::with_templates(DEFAULT_BOOTSTRAP, DEFAULT_UPDATE)
    }

    /// Renderer with custom template sources
    pub fn with_templates(bootstrap: &str, update: &str) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(BOOTSTRAP_TEMPLATE, bootstrap)?;
        tera.add_raw_template(UPDATE_TEMPLATE, update)?;
        Ok(Self { tera })
    }

    fn context(spec: &ServerSpec) -> Context {
        let mut ctx = Context::new();
        ctx.insert("name", &spec.name);
        ctx.insert("edition", spec.edition.as_str());
        ctx.insert("version", spec.version.as_deref().unwrap_or("latest"));
        ctx.insert("protocol", &spec.protocol().to_string());
        ctx.insert("port", &spec.game_port());
        ctx.insert("service", SERVICE_NAME);
        ctx.insert("server_dir", SERVER_DIR);
        ctx.insert("volume", &spec.volume.is_some());
        ctx.insert("rcon_enabled", &spec.rcon.enabled);
        ctx.insert("rcon_port", &spec.rcon.port);
        ctx.insert(
            "rcon_password",
            spec.rcon.password.as_deref().unwrap_or_default(),
        );
        ctx.insert("rcon_broadcast", &spec.rcon.broadcast);
        ctx.insert("monitoring_enabled", &spec.monitoring.enabled);
        ctx.insert("metrics_port", &spec.monitoring.port);
        ctx
    }
}

impl BootstrapRenderer for TemplateRenderer {
    fn render_bootstrap(&self, spec: &ServerSpec) -> Result<String> {
        Ok(self
            .tera
            .render(BOOTSTRAP_TEMPLATE, &Self::context(spec))?)
    }

    fn render_update(&self, spec: &ServerSpec) -> Result<String> {
        Ok(self.tera.render(UPDATE_TEMPLATE, &Self::context(spec))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Edition, MonitoringSpec, RconSpec, SshSpec};

    fn spec(edition: Edition) -> ServerSpec {
        ServerSpec {
            name: "survival".to_string(),
            edition,
            version: Some("1.20.4".to_string()),
            provider: "sakura".to_string(),
            region: "tk1a".to_string(),
            size: "2core-4gb".to_string(),
            port: None,
            spot: false,
            volume: None,
            ssh: SshSpec {
                public_key_file: "/tmp/id.pub".into(),
                private_key_file: None,
                port: 22,
                user: "root".to_string(),
            },
            rcon: RconSpec::default(),
            monitoring: MonitoringSpec::default(),
        }
    }

    /// Java版の起動スクリプト生成を確認
    #[test]
    fn test_java_bootstrap() {
        let mut spec = spec(Edition::Paper);
        spec.rcon.enabled = true;
        spec.rcon.password = Some("hunter2".to_string());

        let out = TemplateRenderer::builtin()
            .unwrap()
            .render_bootstrap(&spec)
            .unwrap();
        assert!(out.starts_with("#cloud-config"));
        assert!(out.contains("server-port=25565"));
        assert!(out.contains("rcon.password=hunter2"));
        assert!(out.contains("openjdk-21-jre-headless"));
        assert!(out.contains("/paper/1.20.4/install.sh"));
    }

    /// Bedrock版の起動スクリプト生成を確認
    #[test]
    fn test_bedrock_bootstrap() {
        let mut spec = spec(Edition::Bedrock);
        spec.monitoring.enabled = true;

        let out = TemplateRenderer::builtin()
            .unwrap()
            .render_bootstrap(&spec)
            .unwrap();
        assert!(out.contains("server-port=19132"));
        assert!(!out.contains("openjdk"));
        assert!(!out.contains("enable-rcon"));
        assert!(out.contains("monitoring/install.sh | bash -s -- 9090"));
    }

    /// アップデートスクリプト生成を確認
    #[test]
    fn test_update_script() {
        let out = TemplateRenderer::builtin()
            .unwrap()
            .render_update(&spec(Edition::Fabric))
            .unwrap();
        assert!(out.contains("systemctl stop craftfleet.service"));
        assert!(out.contains("/fabric/1.20.4/install.sh"));
    }

    /// 不正なテンプレートでエラーになることを確認
    #[test]
    fn test_invalid_template() {
        assert!(TemplateRenderer::with_templates("{% if %}", "").is_err());
    }
}
