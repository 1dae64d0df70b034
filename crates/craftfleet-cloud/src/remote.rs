//! Remote execution on provisioned instances
//!
//! Update and plugin upload talk to the instance over SSH. The default
//! executor wraps the system `ssh`/`scp` binaries.

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Connection details for one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub address: String,
    pub port: u16,
    pub user: String,
    pub identity_file: Option<PathBuf>,
}

impl RemoteTarget {
    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }
}

/// Remote shell seam used by update and plugin upload
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a shell script on the instance
    async fn run_script(&self, target: &RemoteTarget, script: &str) -> Result<String>;

    /// Copy a local file to a path on the instance
    async fn upload(&self, target: &RemoteTarget, source: &Path, destination: &str) -> Result<()>;
}

/// Executor backed by OpenSSH client binaries
#[derive(Debug, Clone, Default)]
pub struct SshExecutor {
    /// Extra `-o` options passed to both `ssh` and `scp`
    pub options: Vec<String>,
}

impl SshExecutor {
    pub fn new() -> Self {
        Self {
            options: vec![
                "StrictHostKeyChecking=accept-new".to_string(),
                "ConnectTimeout=15".to_string(),
            ],
        }
    }

    fn common_args(&self, target: &RemoteTarget) -> Vec<String> {
        let mut args = Vec::new();
        for opt in &self.options {
            args.push("-o".to_string());
            args.push(opt.clone());
        }
        if let Some(identity) = &target.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run_script(&self, target: &RemoteTarget, script: &str) -> Result<String> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.common_args(target));
        cmd.arg("-p").arg(target.port.to_string());
        cmd.arg(target.destination());
        cmd.arg("bash -s");
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running script on {} over ssh", target.destination());

        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(script.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CloudError::CommandFailed(format!(
                "ssh {}: {}",
                target.destination(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn upload(&self, target: &RemoteTarget, source: &Path, destination: &str) -> Result<()> {
        if !source.exists() {
            return Err(CloudError::NotFound(source.display().to_string()));
        }

        let mut cmd = Command::new("scp");
        cmd.args(self.common_args(target));
        cmd.arg("-P").arg(target.port.to_string());
        cmd.arg(source);
        cmd.arg(format!("{}:{}", target.destination(), destination));
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!(
            "Uploading {} to {}:{}",
            source.display(),
            target.destination(),
            destination
        );

        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CloudError::CommandFailed(format!(
                "scp {}: {}",
                source.display(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ssh/scp共通引数を確認
    #[test]
    fn test_common_args() {
        let target = RemoteTarget {
            address: "203.0.113.7".to_string(),
            port: 2222,
            user: "root".to_string(),
            identity_file: Some("/home/me/.ssh/id_ed25519".into()),
        };
        let args = SshExecutor::new().common_args(&target);
        assert_eq!(args.len(), 6);
        assert_eq!(args[4], "-i");
        assert_eq!(target.destination(), "root@203.0.113.7");
    }

    /// 存在しないファイルのアップロードはエラーになることを確認
    #[tokio::test]
    async fn test_upload_missing_source() {
        let target = RemoteTarget {
            address: "203.0.113.7".to_string(),
            port: 22,
            user: "root".to_string(),
            identity_file: None,
        };
        let err = SshExecutor::new()
            .upload(&target, Path::new("/nonexistent/plugin.jar"), "/tmp/")
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::NotFound(_)));
    }
}
