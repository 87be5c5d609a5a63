// Scan pipeline - 扫描流水线
// 建任务 -> 启动进程 -> 输出转事件 -> 产物提取 -> 清理 -> done
//
// 任务内部的任何失败都转成 log 事件；done 在所有路径上恰好发出一次。

use crate::error::RelayError;
use crate::events::EventPublisher;
use crate::jobs::JobRegistry;
use crate::runner::{run_streamed, ExitSummary, OutputStream, RunEvent};
use crate::tools::{Extraction, ToolAdapter};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

const WORKDIR_PREFIX: &str = "chameleon-";

/// 为 query 登记任务并在后台启动扫描，返回任务 id；返回前 id 已可用于 /stream
pub async fn start_scan(
    registry: &JobRegistry,
    adapter: Arc<dyn ToolAdapter>,
    query: String,
) -> String {
    let job_id = registry.create_job().await;
    let publisher = EventPublisher::new(registry.clone(), job_id.clone());

    tokio::spawn(async move {
        if let Err(e) = scan_inner(&publisher, adapter.as_ref(), &query).await {
            publisher.log(format!("Error: {e}")).await;
        }
        publisher.done().await;
    });

    job_id
}

async fn scan_inner(
    publisher: &EventPublisher,
    adapter: &dyn ToolAdapter,
    query: &str,
) -> Result<(), RelayError> {
    let workdir = tempfile::Builder::new().prefix(WORKDIR_PREFIX).tempdir()?;

    let Some(cmd) = adapter.command(query, workdir.path()) else {
        publisher.log(adapter.missing_binary_message()).await;
        cleanup(workdir, publisher.job_id());
        return Ok(());
    };
    for message in adapter.start_messages(query) {
        publisher.log(message).await;
    }

    let mut rx = run_streamed(cmd);
    let mut seen = HashSet::new();
    let mut found = 0usize;
    let mut spawn_failed = false;

    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::Line(OutputStream::Stdout, line)
                if adapter.extraction() == Extraction::Streaming =>
            {
                if let Some(finding) = adapter.parse_line(&line, query) {
                    if seen.insert(finding.id.clone()) {
                        publisher.result(finding).await;
                        found += 1;
                    }
                } else if adapter.log_stdout() {
                    publisher.log(line).await;
                }
            }
            RunEvent::Line(stream, line) => {
                if stream == OutputStream::Stderr || adapter.log_stdout() {
                    publisher.log(line).await;
                }
            }
            RunEvent::Exit(ExitSummary::SpawnFailed { error }) => {
                publisher.log(format!("spawn error: {error}")).await;
                spawn_failed = true;
            }
            RunEvent::Exit(ExitSummary::Exited { code, signal }) => {
                tracing::info!(
                    job_id = %publisher.job_id(),
                    ?code,
                    ?signal,
                    "process exited"
                );
            }
        }
    }

    if !spawn_failed {
        match adapter.extraction() {
            Extraction::Artifact => {
                match adapter.extract_artifact(workdir.path(), query, publisher).await {
                    Ok(n) => found += n,
                    Err(e) => publisher.log(format!("Error parsing results: {e}")).await,
                }
            }
            Extraction::Streaming => {
                if let Some(summary) = adapter.summary(found) {
                    publisher.log(summary).await;
                }
            }
        }
    }

    cleanup(workdir, publisher.job_id());
    Ok(())
}

/// 删除工作目录；失败只记服务端日志，不上报客户端也不影响任务
fn cleanup(workdir: TempDir, job_id: &str) {
    let path = workdir.path().to_path_buf();
    if let Err(e) = workdir.close() {
        tracing::warn!(job_id, path = %path.display(), "workdir cleanup failed: {e}");
    }
}
