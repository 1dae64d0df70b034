//! ポーリング待機モジュール
//!
//! 結果整合なプロバイダー操作を、上限付きの待機に変換します。
//! ポーリング関数は完了時に `Ok(Some(value))`、未完了なら `Ok(None)`、
//! 致命的な失敗なら `Err` を返し、エラーはその場で待機を打ち切ります。

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

/// Default interval between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default bound for a whole server creation
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Absolute point in time an operation must finish by
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            at: started + timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Run a single provider call, aborting on cancellation or when the deadline passes
    pub async fn guard<T, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        call: Fut,
    ) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CloudError::Cancelled(operation.to_string())),
            _ = sleep_until(self.at) => Err(CloudError::Timeout {
                operation: operation.to_string(),
                elapsed: self.elapsed(),
            }),
            result = call => result,
        }
    }
}

/// Retry-until-done primitive with a fixed interval and an overall bound
#[derive(Debug, Clone, Copy)]
pub struct Waiter {
    interval: Duration,
    timeout: Duration,
}

impl Waiter {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Waiter bounded by whatever is left of a deadline
    pub fn within(interval: Duration, deadline: &Deadline) -> Self {
        Self::new(interval, deadline.remaining())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Upper bound on poll calls: `ceil(timeout / interval)`, at least one
    pub fn max_attempts(&self) -> u32 {
        if self.interval.is_zero() {
            return 1;
        }
        let timeout = self.timeout.as_nanos();
        let interval = self.interval.as_nanos();
        let attempts = timeout.div_ceil(interval).max(1);
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }

    /// Poll until done, timed out, failed or cancelled
    pub async fn wait<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut poll: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let started = Instant::now();
        let expires = started + self.timeout;
        let max_attempts = self.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            // a poll that hangs is cut off by the overall timeout
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(CloudError::Cancelled(operation.to_string()));
                }
                outcome = poll() => outcome?,
                _ = sleep_until(expires) => {
                    return Err(CloudError::Timeout {
                        operation: operation.to_string(),
                        elapsed: started.elapsed(),
                    });
                }
            };

            if let Some(value) = outcome {
                tracing::debug!(
                    operation,
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "wait finished"
                );
                return Ok(value);
            }

            let remaining = self.timeout.saturating_sub(started.elapsed());
            if attempt >= max_attempts || remaining.is_zero() {
                pause(operation, cancel, remaining).await?;
                return Err(CloudError::Timeout {
                    operation: operation.to_string(),
                    elapsed: started.elapsed(),
                });
            }

            tracing::trace!(operation, attempt, "not ready yet");
            pause(operation, cancel, self.interval.min(remaining)).await?;

            if started.elapsed() >= self.timeout {
                return Err(CloudError::Timeout {
                    operation: operation.to_string(),
                    elapsed: started.elapsed(),
                });
            }
        }
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_CREATE_TIMEOUT)
    }
}

async fn pause(operation: &str, cancel: &CancellationToken, duration: Duration) -> Result<()> {
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CloudError::Cancelled(operation.to_string())),
        _ = sleep(duration) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    /// 最大ポーリング回数の計算を確認
    #[test]
    fn test_max_attempts() {
        let secs = Duration::from_secs;
        assert_eq!(Waiter::new(secs(2), secs(10)).max_attempts(), 5);
        assert_eq!(Waiter::new(secs(2), secs(9)).max_attempts(), 5);
        assert_eq!(Waiter::new(secs(15), secs(750)).max_attempts(), 50);
        assert_eq!(Waiter::new(secs(2), Duration::ZERO).max_attempts(), 1);
    }

    /// 完了した時点で待機が終わることを確認
    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_after_k_calls() {
        let calls = counter();
        let waiter = Waiter::new(Duration::from_secs(2), Duration::from_secs(60));
        let cancel = CancellationToken::new();

        let c = calls.clone();
        let value = waiter
            .wait("instance running", &cancel, move || {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(if n == 4 { Some("i-1") } else { None }) }
            })
            .await
            .unwrap();

        assert_eq!(value, "i-1");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    /// 完了しない場合はタイムアウトすることを確認
    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let calls = counter();
        let waiter = Waiter::new(Duration::from_secs(2), Duration::from_secs(9));
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let c = calls.clone();
        let err = waiter
            .wait::<(), _, _>("instance running", &cancel, move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Timeout { .. }));
        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_secs(9));
        assert!(calls.load(Ordering::SeqCst) <= waiter.max_attempts());
    }

    /// 応答しないポーリングもタイムアウトで打ち切る
    #[tokio::test(start_paused = true)]
    async fn test_hung_poll_is_cut_off_by_timeout() {
        let waiter = Waiter::new(Duration::from_secs(2), Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(3600),
            waiter.wait::<(), _, _>("instance running", &cancel, || {
                std::future::pending::<Result<Option<()>>>()
            }),
        )
        .await;

        let err = result.expect("waiter ignored its timeout").unwrap_err();
        assert!(matches!(err, CloudError::Timeout { .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    /// 二回目のポーリングで止まっても残り時間で打ち切る
    #[tokio::test(start_paused = true)]
    async fn test_hang_after_first_poll_uses_remaining_time() {
        let calls = counter();
        let waiter = Waiter::new(Duration::from_secs(4), Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let c = calls.clone();
        let err = waiter
            .wait::<(), _, _>("volume available", &cancel, move || {
                let first = c.fetch_add(1, Ordering::SeqCst) == 0;
                async move {
                    if !first {
                        std::future::pending::<()>().await;
                    }
                    Ok(None)
                }
            })
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    /// エラーは即座に待機を打ち切ることを確認
    #[tokio::test(start_paused = true)]
    async fn test_hard_error_short_circuits() {
        let calls = counter();
        let waiter = Waiter::new(Duration::from_secs(2), Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let c = calls.clone();
        let err = waiter
            .wait::<(), _, _>("instance running", &cancel, move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(CloudError::Adapter("quota exceeded".to_string())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Adapter(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    /// キャンセルで待機が中断されることを確認
    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_wait() {
        let waiter = Waiter::new(Duration::from_secs(2), Duration::from_secs(1800));
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let err = waiter
            .wait::<(), _, _>("instance running", &cancel, || async { Ok(None) })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    /// 期限付き呼び出しのタイムアウトとキャンセルを確認
    #[tokio::test(start_paused = true)]
    async fn test_deadline_guard() {
        let deadline = Deadline::after(Duration::from_secs(3));
        let cancel = CancellationToken::new();

        let ok = deadline
            .guard("create key", &cancel, async { Ok::<_, CloudError>(7) })
            .await
            .unwrap();
        assert_eq!(ok, 7);

        let err = deadline
            .guard::<(), _>("create network", &cancel, async {
                sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Timeout { .. }));
        assert!(deadline.is_expired());

        cancel.cancel();
        let err = Deadline::after(Duration::from_secs(60))
            .guard::<(), _>("create volume", &cancel, async { Ok(()) })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
