// Event model - 事件模型
// 扫描事件与 finding 的规范形态，以及写入任务缓冲区的发布器

use crate::jobs::JobRegistry;
use serde::{Deserialize, Serialize};

/// finding 分类，供前端图表聚合使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Profile,
    Site,
    Email,
    Host,
    Ip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// 规范化的单条命中结果，跨工具输出格式统一
///
/// id 由 (站点, 命中值, 查询) 确定性生成，上游重复行折叠为一条 finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub site: String,
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub title: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// 扫描事件 - 每个任务以恰好一个 done 结束
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Log { text: String },
    Result { item: Finding },
    Done,
}

/// 向单个任务缓冲区写入序列化事件的句柄
///
/// 可 Clone；终止事件 done 由注册表把关，多条路径竞争下每个任务也恰好到达一次
#[derive(Clone)]
pub struct EventPublisher {
    registry: JobRegistry,
    job_id: String,
}

impl EventPublisher {
    pub fn new(registry: JobRegistry, job_id: String) -> Self {
        Self { registry, job_id }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn log(&self, text: impl Into<String>) {
        self.publish(Event::Log { text: text.into() }).await;
    }

    pub async fn result(&self, item: Finding) {
        self.publish(Event::Result { item }).await;
    }

    /// 发出终止事件；后续调用为空操作
    pub async fn done(&self) {
        let serialized = serialize(&Event::Done);
        if self.registry.finish(&self.job_id, serialized).await {
            tracing::info!(job_id = %self.job_id, "job done");
        }
    }

    async fn publish(&self, event: Event) {
        let serialized = serialize(&event);
        tracing::debug!(job_id = %self.job_id, event = %serialized, "publish");
        self.registry.append(&self.job_id, serialized).await;
    }
}

fn serialize(event: &Event) -> String {
    // Event 只含字符串/数值字段，序列化不会失败
    serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!("event serialization failed: {e}");
        r#"{"type":"log","text":"internal serialization error"}"#.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding() -> Finding {
        Finding {
            id: "GitHub:https://github.com/alice".into(),
            site: "GitHub".into(),
            kind: FindingKind::Profile,
            value: "https://github.com/alice".into(),
            url: Some("https://github.com/alice".into()),
            title: "GitHub match for \"alice\"".into(),
            snippet: "alice".into(),
            severity: Some(Severity::High),
            confidence: Some(0.9),
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let log = serde_json::to_value(Event::Log { text: "hi".into() }).unwrap();
        assert_eq!(log["type"], "log");
        assert_eq!(log["text"], "hi");

        let done = serde_json::to_value(Event::Done).unwrap();
        assert_eq!(done, serde_json::json!({"type": "done"}));

        let result = serde_json::to_value(Event::Result { item: finding() }).unwrap();
        assert_eq!(result["type"], "result");
        assert_eq!(result["item"]["site"], "GitHub");
        assert_eq!(result["item"]["type"], "profile");
        assert_eq!(result["item"]["severity"], "high");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let mut item = finding();
        item.url = None;
        item.severity = None;
        item.confidence = None;
        let value = serde_json::to_value(&item).unwrap();
        assert!(value.get("url").is_none());
        assert!(value.get("severity").is_none());
        assert!(value.get("confidence").is_none());
    }

    #[tokio::test]
    async fn publisher_emits_done_exactly_once() {
        let registry = crate::jobs::JobRegistry::new();
        let job_id = registry.create_job().await;
        let publisher = EventPublisher::new(registry.clone(), job_id.clone());

        publisher.log("starting").await;
        publisher.done().await;
        publisher.done().await;

        let drained = registry.drain(&job_id).await;
        assert!(drained.finished);
        assert_eq!(drained.events.len(), 2);
        assert!(drained.events[0].contains("\"log\""));
        assert_eq!(drained.events[1], r#"{"type":"done"}"#);
    }
}
