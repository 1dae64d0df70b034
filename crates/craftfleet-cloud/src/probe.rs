//! ワークロードの準備完了確認
//!
//! プロバイダー上で起動済みでも、ゲームサーバーはまだダウンロードや
//! ワールド生成の途中でポートを開いていないことがあります。
//! TCP接続が成功するか試行回数を使い切るまで再試行します。

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Readiness check seam used by the orchestrator
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    /// Wait until `address:port` accepts connections
    ///
    /// `server_id` is only used to label a readiness-timeout error.
    async fn probe(
        &self,
        server_id: &str,
        address: &str,
        port: u16,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// TCP connect probe
#[derive(Debug, Clone)]
pub struct TcpProbe {
    pub attempts: u32,
    pub interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            attempts: 50,
            interval: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl TcpProbe {
    pub fn new(attempts: u32, interval: Duration, connect_timeout: Duration) -> Self {
        Self {
            attempts,
            interval,
            connect_timeout,
        }
    }

    async fn try_connect(&self, target: &str) -> bool {
        match timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                true
            }
            Ok(Err(e)) => {
                tracing::debug!("{} not accepting connections yet: {}", target, e);
                false
            }
            Err(_) => {
                tracing::debug!("connect to {} timed out", target);
                false
            }
        }
    }
}

#[async_trait]
impl ReadinessCheck for TcpProbe {
    async fn probe(
        &self,
        server_id: &str,
        address: &str,
        port: u16,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let target = if address.contains(':') {
            format!("[{}]:{}", address, port)
        } else {
            format!("{}:{}", address, port)
        };

        for attempt in 1..=self.attempts {
            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(CloudError::Cancelled(format!("waiting for {}", target)));
                }
                connected = self.try_connect(&target) => connected,
            };

            if connected {
                tracing::info!("{} is accepting connections (attempt {})", target, attempt);
                return Ok(());
            }

            if attempt < self.attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(CloudError::Cancelled(format!("waiting for {}", target)));
                    }
                    _ = sleep(self.interval) => {}
                }
            }
        }

        Err(CloudError::ReadinessTimeout {
            id: server_id.to_string(),
            address: address.to_string(),
            port,
            attempts: self.attempts,
        })
    }
}
