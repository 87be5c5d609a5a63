// Holehe adapter - 邮箱注册扫描
// streaming 模式：stdout 每行即时判定

use super::{resolve_binary, Extraction, ToolAdapter};
use crate::events::{Finding, FindingKind};
use crate::runner::ToolCommand;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

/// holehe 输出中属于图例/噪音而非命中的行
const NOISE_TOKENS: &[&str] = &["email used", "not used", "rate limit"];

/// 形似裸站点名但实为头部图例的行
const LEGEND_SITES: &[&str] = &["twitter", "github"];

pub struct HoleheAdapter {
    binary_override: Option<PathBuf>,
    slug_re: Regex,
}

impl HoleheAdapter {
    pub fn new(binary_override: Option<PathBuf>) -> Self {
        Self {
            binary_override,
            slug_re: Regex::new(r"^[A-Za-z0-9._-]{2,50}$").unwrap(),
        }
    }

    fn is_noise(site: &str) -> bool {
        let lower = site.to_lowercase();
        NOISE_TOKENS.iter().any(|t| lower.contains(t))
    }

    /// "[+] site" 行：显式命中标记
    fn parse_marked(&self, line: &str) -> Option<String> {
        let site = line.strip_prefix("[+]")?.trim();
        if Self::is_noise(site) || site.contains('@') {
            return None;
        }
        let domain_ish = site.contains('.') && !site.contains(' ') && !site.contains('[') && !site.contains(']');
        if self.slug_re.is_match(site) || domain_ish {
            Some(site.to_string())
        } else {
            None
        }
    }

    /// 形似站点名的裸行 - holehe 有时不带 `[+]` 标记，此处刻意宽容
    fn parse_bare(&self, line: &str) -> Option<String> {
        if line.is_empty()
            || line.starts_with('[')
            || line.starts_with("For ")
            || line.starts_with('*')
            || line.contains('%')
            || line.contains('@')
        {
            return None;
        }
        if line.len() >= 50 || line.contains(' ') {
            return None;
        }
        let all_lowercase = line.chars().any(|c| c.is_lowercase())
            && !line.chars().any(|c| c.is_uppercase());
        if !line.contains('.') && !all_lowercase {
            return None;
        }
        if Self::is_noise(line) || LEGEND_SITES.contains(&line) {
            return None;
        }
        Some(line.to_string())
    }

    fn finding(site: String, email: &str) -> Finding {
        Finding {
            id: format!("site:{site}"),
            site: site.clone(),
            kind: FindingKind::Site,
            value: site.clone(),
            url: None,
            title: format!("{site} registration for \"{email}\""),
            snippet: email.to_string(),
            severity: None,
            confidence: None,
        }
    }
}

#[async_trait]
impl ToolAdapter for HoleheAdapter {
    fn name(&self) -> &'static str {
        "holehe"
    }

    fn missing_binary_message(&self) -> String {
        "ERROR: holehe not found. Please install: pip install holehe".to_string()
    }

    fn command(&self, query: &str, _workdir: &Path) -> Option<ToolCommand> {
        let binary = resolve_binary(
            self.binary_override.as_deref(),
            "holehe",
            &["/usr/local/bin/holehe"],
        )?;
        Some(
            ToolCommand::new(binary)
                .arg(query)
                .arg("--only-used")
                .arg("--no-color"),
        )
    }

    fn extraction(&self) -> Extraction {
        Extraction::Streaming
    }

    fn log_stdout(&self) -> bool {
        false
    }

    fn parse_line(&self, line: &str, query: &str) -> Option<Finding> {
        let line = line.trim();
        let site = if line.starts_with("[+]") {
            self.parse_marked(line)?
        } else {
            self.parse_bare(line)?
        };
        Some(Self::finding(site, query))
    }

    fn summary(&self, found: usize) -> Option<String> {
        Some(if found > 0 {
            format!("Scan complete: Found email registered on {found} site(s)")
        } else {
            "Scan complete: Email not found on any of the 120+ sites checked".to_string()
        })
    }
}
