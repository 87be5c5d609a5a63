// Chameleon Core Library
// OSINT 扫描中继核心：任务注册表、进程执行、结果提取与事件发布

pub mod artifact;
pub mod events;
pub mod exif;
pub mod jobs;
pub mod runner;
pub mod scan;
pub mod tools;
pub mod whois;

// 重新导出常用类型
pub use error::RelayError;
pub use events::{Event, EventPublisher, Finding, FindingKind, Severity};
pub use jobs::{Drained, JobRegistry};
pub use runner::{run_streamed, ExitSummary, OutputStream, RunEvent, ToolCommand};
pub use scan::start_scan;
pub use tools::{Extraction, ToolAdapter, ToolConfig};

pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum RelayError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("artifact parse error: {0}")]
        Artifact(String),

        #[error("{0} not found")]
        ToolMissing(&'static str),

        #[error("tool failed: {0}")]
        ToolFailed(String),

        #[error("{0} timed out")]
        Timeout(&'static str),
    }

    pub type Result<T> = std::result::Result<T, RelayError>;
}
