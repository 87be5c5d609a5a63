// Sherlock adapter - 用户名扫描
// artifact 模式：进程退出后解析工作目录里的 CSV

use super::{resolve_binary, Extraction, ToolAdapter};
use crate::artifact::{locate_artifact, row_is_positive, RowView};
use crate::error::RelayError;
use crate::events::{EventPublisher, Finding, FindingKind, Severity};
use crate::runner::ToolCommand;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const SITE_COLUMNS: &[&str] = &["site", "name", "platform", "SITE", "Site"];
const URL_COLUMNS: &[&str] = &["url_user", "url user", "URL", "url"];
const STATUS_COLUMNS: &[&str] = &["status", "exists", "result"];

/// 前端图表中权重更高的站点
const HIGH_PRIORITY_SITES: &[&str] = &["twitter", "facebook", "linkedin", "github", "instagram"];

pub struct SherlockAdapter {
    binary_override: Option<PathBuf>,
}

impl SherlockAdapter {
    pub fn new(binary_override: Option<PathBuf>) -> Self {
        Self { binary_override }
    }

    fn row_to_finding(row: &RowView<'_>, query: &str) -> Option<Finding> {
        let site = row.field(SITE_COLUMNS).unwrap_or("unknown");
        let url = row.field(URL_COLUMNS);
        let status = row.field(STATUS_COLUMNS);

        if !row_is_positive(status, url) {
            return None;
        }

        let locator = url.unwrap_or("").to_string();
        let value = if locator.is_empty() {
            query.to_string()
        } else {
            locator.clone()
        };
        Some(Finding {
            id: format!("{site}:{value}"),
            site: site.to_string(),
            kind: FindingKind::Profile,
            value,
            url: url.map(str::to_string),
            title: format!("{site} match for \"{query}\""),
            snippet: query.to_string(),
            severity: Some(infer_severity(site)),
            confidence: Some(0.9),
        })
    }
}

fn infer_severity(site: &str) -> Severity {
    if HIGH_PRIORITY_SITES.contains(&site.to_lowercase().as_str()) {
        Severity::High
    } else {
        Severity::Medium
    }
}

#[async_trait]
impl ToolAdapter for SherlockAdapter {
    fn name(&self) -> &'static str {
        "sherlock"
    }

    fn missing_binary_message(&self) -> String {
        "ERROR: Sherlock not found. Please install: pip install sherlock-project".to_string()
    }

    fn command(&self, query: &str, workdir: &Path) -> Option<ToolCommand> {
        let binary = resolve_binary(
            self.binary_override.as_deref(),
            "sherlock",
            &["/usr/local/bin/sherlock"],
        )?;
        Some(
            ToolCommand::new(binary)
                .arg(query)
                .arg("--csv")
                .arg("--print-found")
                .cwd(workdir),
        )
    }

    fn extraction(&self) -> Extraction {
        Extraction::Artifact
    }

    async fn extract_artifact(
        &self,
        workdir: &Path,
        query: &str,
        publisher: &EventPublisher,
    ) -> Result<usize, RelayError> {
        let Some(csv_path) = locate_artifact(workdir, query, "csv").await else {
            tracing::info!(job_id = %publisher.job_id(), "no csv artifact found");
            publisher.log("No CSV file produced by Sherlock.").await;
            return Ok(0);
        };
        tracing::info!(job_id = %publisher.job_id(), path = %csv_path.display(), "parsing csv artifact");

        let raw = tokio::fs::read_to_string(&csv_path).await?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(raw.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| RelayError::Artifact(e.to_string()))?
            .clone();

        let mut seen = HashSet::new();
        let mut emitted = 0usize;
        for record in reader.records() {
            let record = record.map_err(|e| RelayError::Artifact(e.to_string()))?;
            let row = RowView::new(&headers, &record);
            if let Some(finding) = Self::row_to_finding(&row, query) {
                if seen.insert(finding.id.clone()) {
                    publisher.result(finding).await;
                    emitted += 1;
                }
            }
        }
        Ok(emitted)
    }
}
