// Maigret adapter - 用户名扫描
// streaming 模式：ndjson 每行一个站点判定，带纯文本回退解析

use super::{resolve_binary, Extraction, ToolAdapter};
use crate::events::{Finding, FindingKind};
use crate::runner::ToolCommand;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub struct MaigretAdapter {
    binary_override: Option<PathBuf>,
}

impl MaigretAdapter {
    pub fn new(binary_override: Option<PathBuf>) -> Self {
        Self { binary_override }
    }

    /// ndjson 记录：`{"site": ..., "url": ..., "status": {...}}`，
    /// 不同 maigret 版本键名有别
    fn parse_ndjson(line: &str, query: &str) -> Option<Finding> {
        let data: Value = serde_json::from_str(line).ok()?;
        let obj = data.as_object()?;

        let site = first_str(obj, &["site", "sitename", "name"])?;
        let url = first_str(obj, &["url", "url_user", "link"])?;

        let is_found = match obj.get("status") {
            Some(Value::Object(status)) => {
                let status_val = status
                    .get("status")
                    .map(value_text)
                    .unwrap_or_default()
                    .to_lowercase();
                let exists_val = status
                    .get("exists")
                    .map(value_text)
                    .unwrap_or_default()
                    .to_lowercase();
                status_val.contains("claimed")
                    || status_val.contains("found")
                    || exists_val == "true"
            }
            _ => url.starts_with("http"),
        };

        if !is_found {
            return None;
        }
        Some(Self::finding(site, Some(url), query))
    }

    /// 纯文本回退：`[+] Site: URL`
    fn parse_plain(line: &str, query: &str) -> Option<Finding> {
        let after = line.strip_prefix("[+]")?.trim();
        let (site, url_part) = after.split_once(':')?;
        let site = site.trim();
        let url = url_part.trim().split_whitespace().next()?;
        if site.is_empty() || !url.starts_with("http") {
            return None;
        }
        Some(Self::finding(site.to_string(), Some(url.to_string()), query))
    }

    fn finding(site: String, url: Option<String>, query: &str) -> Finding {
        Finding {
            id: format!("site:{site}"),
            site: site.clone(),
            kind: FindingKind::Site,
            value: site.clone(),
            url,
            title: format!("{site} profile for \"{query}\""),
            snippet: query.to_string(),
            severity: None,
            confidence: None,
        }
    }
}

fn first_str(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(|v| v.as_str())
        .map(str::to_string)
        .next()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ToolAdapter for MaigretAdapter {
    fn name(&self) -> &'static str {
        "maigret"
    }

    fn missing_binary_message(&self) -> String {
        "ERROR: maigret not found. Please install: pip install maigret".to_string()
    }

    fn command(&self, query: &str, _workdir: &Path) -> Option<ToolCommand> {
        let binary = resolve_binary(
            self.binary_override.as_deref(),
            "maigret",
            &["/usr/local/bin/maigret"],
        )?;
        Some(
            ToolCommand::new(binary)
                .arg(query)
                .args(["--timeout", "30"])
                .arg("-a")
                .args(["-J", "ndjson"])
                .arg("--no-color"),
        )
    }

    fn extraction(&self) -> Extraction {
        Extraction::Streaming
    }

    fn log_stdout(&self) -> bool {
        false
    }

    fn start_messages(&self, query: &str) -> Vec<String> {
        vec![format!("Starting Maigret scan for username: {query}")]
    }

    fn parse_line(&self, line: &str, query: &str) -> Option<Finding> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Self::parse_ndjson(line, query).or_else(|| Self::parse_plain(line, query))
    }
}
