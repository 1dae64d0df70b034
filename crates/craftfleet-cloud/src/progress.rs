//! 進捗表示モジュール
//!
//! ライフサイクル操作は [`ProgressSink`] に進捗を通知します。長い操作の間は
//! [`ProgressSession`] がハートビートタスクで「処理中」の更新を送ります。
//! 停止するとハートビートを止め、タスクの終了を待ってから最終メッセージを
//! 送ります。二回目以降の停止は何もしません。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Default cadence of "still working" updates
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

/// How an operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressOutcome {
    Success(String),
    Failure(String),
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn start(&self, message: &str);

    fn update(&self, message: &str);

    fn stop(&self, outcome: &ProgressOutcome);
}

/// Sink that forwards to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn start(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn update(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn stop(&self, outcome: &ProgressOutcome) {
        match outcome {
            ProgressOutcome::Success(msg) => tracing::info!("{}", msg),
            ProgressOutcome::Failure(msg) => tracing::error!("{}", msg),
        }
    }
}

/// One started operation with its heartbeat
pub struct ProgressSession {
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressSession {
    /// Emit the start message and spawn the heartbeat
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(sink: Arc<dyn ProgressSink>, message: &str, every: Duration) -> Self {
        sink.start(message);

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_sink = sink.clone();
        let label = message.to_string();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            loop {
                tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => break,
                    _ = sleep(every) => {
                        task_sink.update(&format!(
                            "{} (still working, {}s elapsed)",
                            label,
                            started.elapsed().as_secs()
                        ));
                    }
                }
            }
        });

        Self {
            sink,
            cancel,
            heartbeat: Mutex::new(Some(handle)),
        }
    }

    pub fn update(&self, message: &str) {
        self.sink.update(message);
    }

    /// Stop the heartbeat and emit the final message
    ///
    /// Returns `false` if the session was already stopped.
    pub async fn stop(&self, outcome: ProgressOutcome) -> bool {
        let Some(handle) = self.heartbeat.lock().await.take() else {
            return false;
        };
        self.cancel.cancel();
        if let Err(e) = handle.await {
            tracing::debug!("progress heartbeat ended abnormally: {}", e);
        }
        self.sink.stop(&outcome);
        true
    }

    pub async fn is_active(&self) -> bool {
        self.heartbeat.lock().await.is_some()
    }
}

impl Drop for ProgressSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        events: StdMutex<Vec<String>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
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

    /// ハートビートで進捗が更新されることを確認
    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_emits_updates() {
        let sink = Arc::new(RecordingSink::default());
        let session = ProgressSession::start(sink.clone(), "Creating", Duration::from_secs(30));

        sleep(Duration::from_secs(95)).await;
        assert!(session.stop(ProgressOutcome::Success("done".into())).await);

        let events = sink.events();
        assert_eq!(events.first().map(String::as_str), Some("start:Creating"));
        assert_eq!(
            events.iter().filter(|e| e.starts_with("update:")).count(),
            3
        );
        assert_eq!(events.last().map(String::as_str), Some("ok:done"));
    }

    /// 二重に停止しても一度しか通知しないことを確認
    #[tokio::test(start_paused = true)]
    async fn test_stop_twice_emits_once() {
        let sink = Arc::new(RecordingSink::default());
        let session = ProgressSession::start(sink.clone(), "Deleting", Duration::from_secs(30));

        assert!(session.stop(ProgressOutcome::Failure("boom".into())).await);
        assert!(!session.stop(ProgressOutcome::Success("again".into())).await);
        assert!(!session.is_active().await);

        let finals: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| e.starts_with("ok:") || e.starts_with("err:"))
            .collect();
        assert_eq!(finals, vec!["err:boom".to_string()]);
    }

    /// 停止後は更新されないことを確認
    #[tokio::test(start_paused = true)]
    async fn test_no_updates_after_stop() {
        let sink = Arc::new(RecordingSink::default());
        let session = ProgressSession::start(sink.clone(), "Updating", Duration::from_secs(1));
        session.stop(ProgressOutcome::Success("done".into())).await;

        let before = sink.events().len();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(sink.events().len(), before);
    }
}
