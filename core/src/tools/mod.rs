// Tool adapters - 工具适配器模块
// 每个 OSINT 工具一个适配器：负责命令行构造与输出到 finding 的转换

pub mod harvester;
pub mod holehe;
pub mod maigret;
pub mod sherlock;

use crate::error::RelayError;
use crate::events::{EventPublisher, Finding};
use crate::runner::ToolCommand;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// 适配器把进程输出转为 finding 的两种方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// stdout 每行都是候选，读到即发出
    Streaming,
    /// 工具向工作目录写结构化文件，进程退出后再解析
    Artifact,
}

/// 工具适配器 trait - 每个被包装的 OSINT 工具都需要实现此接口
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// 可执行文件无法解析时发布的提示
    fn missing_binary_message(&self) -> String;

    /// 为 query 构造完整命令；二进制未安装时返回 None。参数是结构化的，不走 shell
    fn command(&self, query: &str, workdir: &Path) -> Option<ToolCommand>;

    fn extraction(&self) -> Extraction;

    /// 原始 stdout 行是否转发为 log 事件；自行解析 stdout 的 streaming 适配器通常关闭
    fn log_stdout(&self) -> bool {
        true
    }

    /// 进程启动前发布的日志行
    fn start_messages(&self, query: &str) -> Vec<String> {
        let _ = query;
        Vec::new()
    }

    /// streaming 提取：把一行 stdout 映射为候选 finding
    fn parse_line(&self, line: &str, query: &str) -> Option<Finding> {
        let _ = (line, query);
        None
    }

    /// 扫描结束后的汇总日志，入参为去重后的 finding 数
    fn summary(&self, found: usize) -> Option<String> {
        let _ = found;
        None
    }

    /// artifact 提取：定位并解析产物文件，发布去重后的 result 事件，
    /// 返回发出的数量。产物缺失不算错误，记日志并返回 Ok(0)
    async fn extract_artifact(
        &self,
        workdir: &Path,
        query: &str,
        publisher: &EventPublisher,
    ) -> Result<usize, RelayError> {
        let _ = (workdir, query, publisher);
        Ok(0)
    }
}

/// 各工具的可执行文件位置 - 启动时从环境变量读取一次，测试直接构造
#[derive(Debug, Clone, Default)]
pub struct ToolConfig {
    pub sherlock_bin: Option<PathBuf>,
    pub maigret_bin: Option<PathBuf>,
    pub holehe_bin: Option<PathBuf>,
    pub harvester_bin: Option<PathBuf>,
    pub whois_bin: Option<PathBuf>,
    pub exiftool_bin: Option<PathBuf>,
}

impl ToolConfig {
    pub fn from_env() -> Self {
        Self {
            sherlock_bin: env_path("SHERLOCK_BIN"),
            maigret_bin: env_path("MAIGRET_BIN"),
            holehe_bin: env_path("HOLEHE_BIN"),
            harvester_bin: env_path("HARVESTER_BIN"),
            whois_bin: env_path("WHOIS_BIN"),
            exiftool_bin: env_path("EXIFTOOL_BIN"),
        }
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// 解析工具二进制：显式覆盖优先，其次 $PATH，最后常见安装路径
pub fn resolve_binary(
    override_path: Option<&Path>,
    name: &str,
    fallbacks: &[&str],
) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = which::which(name) {
        return Some(path);
    }
    fallbacks
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_path_lookup() {
        let override_path = PathBuf::from("/opt/custom/sherlock");
        let resolved = resolve_binary(Some(&override_path), "sherlock", &[]);
        assert_eq!(resolved, Some(override_path));
    }

    #[test]
    fn unresolvable_binary_is_none() {
        assert!(resolve_binary(None, "definitely-not-a-real-tool-x9", &["/nonexistent/bin"]).is_none());
    }
}
