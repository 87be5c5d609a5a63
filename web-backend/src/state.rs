use chameleon_core::tools::ToolConfig;
use chameleon_core::JobRegistry;
use std::time::Duration;

/// 已结束任务的缓冲区保留时长，超时由清扫器回收；客户端通常远早于此取完
pub const JOB_TTL: Duration = Duration::from_secs(15 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub registry: JobRegistry,
    pub tools: ToolConfig,
}

impl AppState {
    pub fn new(tools: ToolConfig) -> Self {
        Self {
            registry: JobRegistry::new(),
            tools,
        }
    }

    /// 周期性清除已结束任务，注册表不随服务长期运行无限增长
    pub fn spawn_sweeper(&self) {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let evicted = registry.sweep(JOB_TTL).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "swept finished jobs");
                }
            }
        });
    }
}
