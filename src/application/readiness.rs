//! Readiness Prober - 服务就绪探测
//!
//! 固定间隔轮询 `GET /`，任意一次 200 即就绪。
//! 连接错误视为"尚未就绪"；预算耗尽返回 false，由调用方决定是否致命。

use std::time::{Duration, Instant};

use crate::application::ports::GenerationServerPort;

/// 就绪探测器
#[derive(Debug, Clone)]
pub struct ReadinessProber {
    interval: Duration,
}

impl Default for ReadinessProber {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl ReadinessProber {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 给定预算内的最大尝试次数: ceil(timeout / interval)，至少 1 次
    pub fn max_attempts(&self, timeout: Duration) -> u32 {
        let interval = self.interval.as_millis();
        let budget = timeout.as_millis();
        let attempts = (budget + interval - 1) / interval;
        attempts.clamp(1, u32::MAX as u128) as u32
    }

    /// 等待服务就绪
    ///
    /// 每次请求最多占用一个间隔，总耗时不超过 timeout + interval。
    pub async fn wait_until_ready(
        &self,
        server: &dyn GenerationServerPort,
        timeout: Duration,
    ) -> bool {
        let attempts = self.max_attempts(timeout);
        let started = Instant::now();

        tracing::info!(
            url = %server.base_url(),
            timeout_secs = timeout.as_secs_f64(),
            "Waiting for server to become ready"
        );

        for attempt in 1..=attempts {
            if attempt > 1 && started.elapsed() >= timeout {
                break;
            }

            match tokio::time::timeout(self.interval, server.ping()).await {
                Ok(Ok(200)) => {
                    tracing::info!(
                        attempt,
                        elapsed_secs = started.elapsed().as_secs_f64(),
                        "Server is ready"
                    );
                    return true;
                }
                Ok(Ok(status)) => {
                    tracing::debug!(attempt, status, "Server not ready yet");
                }
                Ok(Err(e)) => {
                    tracing::debug!(attempt, error = %e, "Server not reachable yet");
                }
                Err(_) => {
                    tracing::debug!(attempt, "Readiness request timed out");
                }
            }

            if attempt < attempts {
                let remaining = timeout.saturating_sub(started.elapsed());
                tokio::time::sleep(self.interval.min(remaining)).await;
            }
        }

        tracing::error!(
            url = %server.base_url(),
            timeout_secs = timeout.as_secs_f64(),
            "Server did not become ready in time"
        );
        false
    }
}
