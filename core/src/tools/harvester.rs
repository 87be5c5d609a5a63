// theHarvester adapter - 域名情报收集
// artifact 模式：进程退出后解析 JSON 结果文件

use super::{resolve_binary, Extraction, ToolAdapter};
use crate::error::RelayError;
use crate::events::{EventPublisher, Finding, FindingKind};
use crate::runner::ToolCommand;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const RESULTS_FILE: &str = "results.json";

/// 无需 API key 的免费数据源
const DEFAULT_SOURCES: &str = "crtsh,hackertarget,dnsdumpster,virustotal,otx,rapiddns";

#[derive(Debug, Clone)]
pub struct HarvesterOptions {
    pub dns_resolve: bool,
    pub dns_brute: bool,
    pub sources: String,
}

impl Default for HarvesterOptions {
    fn default() -> Self {
        Self {
            dns_resolve: false,
            dns_brute: false,
            sources: DEFAULT_SOURCES.to_string(),
        }
    }
}

pub struct HarvesterAdapter {
    binary_override: Option<PathBuf>,
    options: HarvesterOptions,
}

impl HarvesterAdapter {
    pub fn new(binary_override: Option<PathBuf>, options: HarvesterOptions) -> Self {
        Self {
            binary_override,
            options,
        }
    }

    fn email_finding(email: &str, domain: &str) -> Finding {
        Finding {
            id: format!("email:{email}"),
            site: domain.to_string(),
            kind: FindingKind::Email,
            value: email.to_string(),
            url: None,
            title: format!("Email address at {domain}"),
            snippet: domain.to_string(),
            severity: None,
            confidence: None,
        }
    }

    fn host_finding(host: &str, domain: &str) -> Finding {
        Finding {
            id: format!("host:{host}"),
            site: domain.to_string(),
            kind: FindingKind::Host,
            value: host.to_string(),
            url: None,
            title: format!("Host under {domain}"),
            snippet: domain.to_string(),
            severity: None,
            confidence: None,
        }
    }

    fn ip_finding(ip: &str, domain: &str) -> Finding {
        Finding {
            id: format!("ip:{ip}"),
            site: domain.to_string(),
            kind: FindingKind::Ip,
            value: ip.to_string(),
            url: None,
            title: format!("IP address for {domain}"),
            snippet: domain.to_string(),
            severity: None,
            confidence: None,
        }
    }

    /// 多数版本的 theHarvester 会给 `-f` 文件名再加 `.json`，少数按原名写
    async fn results_path(workdir: &Path) -> Option<PathBuf> {
        let suffixed = workdir.join(format!("{RESULTS_FILE}.json"));
        if tokio::fs::try_exists(&suffixed).await.unwrap_or(false) {
            return Some(suffixed);
        }
        let plain = workdir.join(RESULTS_FILE);
        if tokio::fs::try_exists(&plain).await.unwrap_or(false) {
            return Some(plain);
        }
        None
    }
}

#[async_trait]
impl ToolAdapter for HarvesterAdapter {
    fn name(&self) -> &'static str {
        "theharvester"
    }

    fn missing_binary_message(&self) -> String {
        "ERROR: theHarvester not found. Please install: pip install theHarvester".to_string()
    }

    fn command(&self, query: &str, workdir: &Path) -> Option<ToolCommand> {
        let binary = resolve_binary(
            self.binary_override.as_deref(),
            "theHarvester",
            &["/usr/local/bin/theHarvester"],
        )?;
        let mut cmd = ToolCommand::new(binary)
            .args(["-d", query])
            .args(["-b", &self.options.sources])
            .arg("-f")
            .arg(workdir.join(RESULTS_FILE).to_string_lossy())
            .args(["-l", "200"]);
        if self.options.dns_resolve {
            cmd = cmd.arg("-n");
        }
        if self.options.dns_brute {
            cmd = cmd.arg("-c");
        }
        // -q 抑制 API key 警告
        Some(cmd.arg("-q").cwd(workdir))
    }

    fn extraction(&self) -> Extraction {
        Extraction::Artifact
    }

    fn start_messages(&self, _query: &str) -> Vec<String> {
        let mut messages = Vec::new();
        if self.options.dns_resolve {
            messages.push("DNS resolution enabled".to_string());
        }
        if self.options.dns_brute {
            messages.push("DNS brute force enabled (this may take longer)".to_string());
        }
        messages
    }

    async fn extract_artifact(
        &self,
        workdir: &Path,
        query: &str,
        publisher: &EventPublisher,
    ) -> Result<usize, RelayError> {
        let Some(path) = Self::results_path(workdir).await else {
            tracing::info!(job_id = %publisher.job_id(), "no harvester results file");
            publisher
                .log(format!(
                    "No results file produced. Check if domain '{query}' exists."
                ))
                .await;
            return Ok(0);
        };
        tracing::info!(job_id = %publisher.job_id(), path = %path.display(), "parsing harvester results");

        let raw = tokio::fs::read_to_string(&path).await?;
        let data: Value =
            serde_json::from_str(&raw).map_err(|e| RelayError::Artifact(e.to_string()))?;

        let mut seen = HashSet::new();
        let mut seen_ips = HashSet::new();
        let mut emitted = 0usize;
        let mut email_count = 0usize;
        let mut host_count = 0usize;

        for email in str_array(&data, "emails") {
            let finding = Self::email_finding(&email, query);
            if seen.insert(finding.id.clone()) {
                publisher.result(finding).await;
                emitted += 1;
                email_count += 1;
            }
        }

        for entry in str_array(&data, "hosts") {
            // DNS 解析开启时为 "host:ip" 形式
            let (host, ip) = match entry.split_once(':') {
                Some((host, ip)) => (host.to_string(), Some(ip.to_string())),
                None => (entry, None),
            };
            let finding = Self::host_finding(&host, query);
            if seen.insert(finding.id.clone()) {
                publisher.result(finding).await;
                emitted += 1;
                host_count += 1;
            }
            if let Some(ip) = ip.filter(|ip| !ip.is_empty()) {
                if seen_ips.insert(ip.clone()) {
                    let finding = Self::ip_finding(&ip, query);
                    if seen.insert(finding.id.clone()) {
                        publisher.result(finding).await;
                        emitted += 1;
                    }
                }
            }
        }

        for ip in str_array(&data, "ips") {
            if seen_ips.insert(ip.clone()) {
                let finding = Self::ip_finding(&ip, query);
                if seen.insert(finding.id.clone()) {
                    publisher.result(finding).await;
                    emitted += 1;
                }
            }
        }

        publisher
            .log(format!(
                "Parsing complete: {email_count} emails, {host_count} hosts, {} IPs",
                seen_ips.len()
            ))
            .await;
        Ok(emitted)
    }
}

fn str_array(data: &Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobRegistry;

    async fn extract(json: &str) -> Vec<serde_json::Value> {
        let registry = JobRegistry::new();
        let job_id = registry.create_job().await;
        let publisher = EventPublisher::new(registry.clone(), job_id.clone());

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("results.json.json"), json).unwrap();

        let adapter = HarvesterAdapter::new(None, HarvesterOptions::default());
        adapter
            .extract_artifact(dir.path(), "example.com", &publisher)
            .await
            .unwrap();
        registry
            .drain(&job_id)
            .await
            .events
            .iter()
            .map(|e| serde_json::from_str(e).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn emails_hosts_and_ips_become_findings() {
        let events = extract(
            r#"{"emails":["a@example.com"],"hosts":["www.example.com:93.184.216.34"],"ips":["203.0.113.9"]}"#,
        )
        .await;

        let results: Vec<_> = events.iter().filter(|e| e["type"] == "result").collect();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0]["item"]["id"], "email:a@example.com");
        assert_eq!(results[1]["item"]["id"], "host:www.example.com");
        assert_eq!(results[2]["item"]["id"], "ip:93.184.216.34");
        assert_eq!(results[3]["item"]["id"], "ip:203.0.113.9");

        let summary = events.last().unwrap();
        assert_eq!(summary["type"], "log");
        assert_eq!(summary["text"], "Parsing complete: 1 emails, 1 hosts, 2 IPs");
    }

    #[tokio::test]
    async fn duplicate_ips_are_collapsed() {
        let events = extract(
            r#"{"hosts":["a.example.com:203.0.113.9","b.example.com:203.0.113.9"],"ips":["203.0.113.9"]}"#,
        )
        .await;
        let ip_results: Vec<_> = events
            .iter()
            .filter(|e| e["type"] == "result" && e["item"]["type"] == "ip")
            .collect();
        assert_eq!(ip_results.len(), 1);
    }

    #[tokio::test]
    async fn missing_results_file_logs_and_returns_zero() {
        let registry = JobRegistry::new();
        let job_id = registry.create_job().await;
        let publisher = EventPublisher::new(registry.clone(), job_id.clone());
        let dir = tempfile::tempdir().unwrap();

        let adapter = HarvesterAdapter::new(None, HarvesterOptions::default());
        let emitted = adapter
            .extract_artifact(dir.path(), "nosuchdomain.test", &publisher)
            .await
            .unwrap();

        assert_eq!(emitted, 0);
        let events = registry.drain(&job_id).await.events;
        assert!(events[0].contains("No results file produced"));
    }

    #[tokio::test]
    async fn malformed_json_is_an_artifact_error() {
        let registry = JobRegistry::new();
        let job_id = registry.create_job().await;
        let publisher = EventPublisher::new(registry.clone(), job_id.clone());
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("results.json"), "not json").unwrap();

        let adapter = HarvesterAdapter::new(None, HarvesterOptions::default());
        let err = adapter
            .extract_artifact(dir.path(), "example.com", &publisher)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Artifact(_)));
    }

    #[test]
    fn dns_flags_shape_argv_and_start_messages() {
        let adapter = HarvesterAdapter::new(
            Some(PathBuf::from("/opt/theHarvester")),
            HarvesterOptions {
                dns_resolve: true,
                dns_brute: true,
                sources: "crtsh".into(),
            },
        );
        let dir = tempfile::tempdir().unwrap();
        let cmd = adapter.command("example.com", dir.path()).unwrap();
        assert!(cmd.args.contains(&"-n".to_string()));
        assert!(cmd.args.contains(&"-c".to_string()));
        assert!(cmd.args.contains(&"crtsh".to_string()));
        assert_eq!(cmd.args.last().unwrap(), "-q");

        assert_eq!(adapter.start_messages("example.com").len(), 2);
    }
}
