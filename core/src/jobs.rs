// Job registry - 任务注册表
// 内存中的 job id -> 事件缓冲区映射

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// 单个任务的事件缓冲区
struct JobEntry {
    buffer: Vec<String>,
    finished_at: Option<Instant>,
}

/// 一次 drain 的结果
#[derive(Debug, Default)]
pub struct Drained {
    /// 按写入顺序排列的序列化事件
    pub events: Vec<String>,
    /// 终止事件 done 已被取走后为 true
    pub finished: bool,
}

/// 内存中的扫描任务注册表 - 服务端状态持有，扫描流水线写入，stream 端点取走
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<Mutex<HashMap<String, JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 分配新任务 id 并登记空缓冲区；返回前已注册，立即可用于 /stream
    pub async fn create_job(&self) -> String {
        let job_id = Uuid::new_v4().simple().to_string();
        let mut inner = self.inner.lock().await;
        inner.insert(
            job_id.clone(),
            JobEntry {
                buffer: Vec::new(),
                finished_at: None,
            },
        );
        job_id
    }

    pub async fn exists(&self, job_id: &str) -> bool {
        self.inner.lock().await.contains_key(job_id)
    }

    /// 追加一条序列化事件；未知 id 静默忽略，迟到的进程回调不会打断流水线
    pub async fn append(&self, job_id: &str, event: String) {
        let mut inner = self.inner.lock().await;
        match inner.get_mut(job_id) {
            Some(entry) => entry.buffer.push(event),
            None => tracing::debug!(job_id, "append to unknown job ignored"),
        }
    }

    /// 追加终止事件并标记任务结束；任务未知或已结束时返回 false，
    /// 调用方此时不得再入队第二个终止事件
    pub async fn finish(&self, job_id: &str, event: String) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.get_mut(job_id) {
            Some(entry) if entry.finished_at.is_none() => {
                entry.buffer.push(event);
                entry.finished_at = Some(Instant::now());
                true
            }
            _ => false,
        }
    }

    /// 取走当前缓冲的全部事件，保持写入顺序；空闲任务得到空集而非错误
    pub async fn drain(&self, job_id: &str) -> Drained {
        let mut inner = self.inner.lock().await;
        match inner.get_mut(job_id) {
            Some(entry) => {
                let events = std::mem::take(&mut entry.buffer);
                Drained {
                    events,
                    finished: entry.finished_at.is_some(),
                }
            }
            None => Drained::default(),
        }
    }

    /// 清除结束超过 max_age 的任务；运行中的任务不清除。返回清除数量
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.len();
        inner.retain(|_, entry| match entry.finished_at {
            Some(at) => at.elapsed() < max_age,
            None => true,
        });
        before - inner.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_preserves_insertion_order() {
        let registry = JobRegistry::new();
        let job_id = registry.create_job().await;

        registry.append(&job_id, "a".into()).await;
        registry.append(&job_id, "b".into()).await;
        registry.append(&job_id, "c".into()).await;

        let drained = registry.drain(&job_id).await;
        assert_eq!(drained.events, vec!["a", "b", "c"]);
        assert!(!drained.finished);

        // 再次 drain 得到空集
        let drained = registry.drain(&job_id).await;
        assert!(drained.events.is_empty());
    }

    #[tokio::test]
    async fn append_to_unknown_job_is_noop() {
        let registry = JobRegistry::new();
        registry.append("nope", "x".into()).await;
        assert!(!registry.exists("nope").await);
        assert!(registry.drain("nope").await.events.is_empty());
    }

    #[tokio::test]
    async fn finish_is_once_only() {
        let registry = JobRegistry::new();
        let job_id = registry.create_job().await;

        assert!(registry.finish(&job_id, "done".into()).await);
        assert!(!registry.finish(&job_id, "done".into()).await);

        let drained = registry.drain(&job_id).await;
        assert_eq!(drained.events.len(), 1);
        assert!(drained.finished);
    }

    #[tokio::test]
    async fn sweep_only_evicts_finished_jobs() {
        let registry = JobRegistry::new();
        let running = registry.create_job().await;
        let finished = registry.create_job().await;
        registry.finish(&finished, "done".into()).await;

        assert_eq!(registry.sweep(Duration::ZERO).await, 1);
        assert!(registry.exists(&running).await);
        assert!(!registry.exists(&finished).await);
    }

    #[tokio::test]
    async fn concurrent_append_and_drain_loses_nothing() {
        let registry = JobRegistry::new();
        let job_id = registry.create_job().await;

        let writer = {
            let registry = registry.clone();
            let job_id = job_id.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    registry.append(&job_id, i.to_string()).await;
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 500 {
            let drained = registry.drain(&job_id).await;
            seen.extend(drained.events);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        let expected: Vec<String> = (0..500).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
    }
}
