// WHOIS lookup - 域名注册信息查询
// 同步一次性子进程，不走 job 流水线

use crate::error::RelayError;
use crate::tools::resolve_binary;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
pub struct WhoisReport {
    pub domain: String,
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
}

/// 对 domain 执行 whois 并从原始注册局文本中解析常见字段
pub async fn lookup(
    binary_override: Option<&Path>,
    domain: &str,
) -> Result<WhoisReport, RelayError> {
    let binary = resolve_binary(binary_override, "whois", &["/usr/bin/whois"])
        .ok_or(RelayError::ToolMissing("whois"))?;

    let output = tokio::time::timeout(
        LOOKUP_TIMEOUT,
        Command::new(&binary)
            .arg(domain)
            .stdin(Stdio::null())
            .output(),
    )
    .await
    .map_err(|_| RelayError::Timeout("whois"))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(RelayError::ToolFailed(stderr));
    }

    let raw = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok(parse_whois(domain, &raw))
}

/// 尽力而为的字段提取 - 注册局输出极不统一，首个匹配生效，此处不产生错误
pub fn parse_whois(domain: &str, raw: &str) -> WhoisReport {
    let mut report = WhoisReport {
        domain: domain.to_string(),
        raw: raw.to_string(),
        registrar: None,
        registrant: None,
        created: None,
        expires: None,
        updated: None,
        nameservers: Vec::new(),
        status: Vec::new(),
        emails: Vec::new(),
    };

    for line in raw.to_lowercase().lines() {
        let line = line.trim();
        let value = |l: &str| l.split_once(':').map(|(_, v)| v.trim().to_string());

        if line.contains("registrar:") && report.registrar.is_none() {
            report.registrar = value(line);
        } else if line.contains("registrant organization:") && report.registrant.is_none() {
            report.registrant = value(line);
        } else if line.contains("registrant") && line.contains("organization:") && report.registrant.is_none() {
            report.registrant = value(line);
        } else if (line.contains("creation date:") || line.contains("created:"))
            && report.created.is_none()
        {
            report.created = value(line);
        } else if line.contains("expir") && line.contains("date:") && report.expires.is_none() {
            report.expires = value(line);
        } else if (line.contains("updated date:") || line.contains("last updated:"))
            && report.updated.is_none()
        {
            report.updated = value(line);
        }
    }

    for line in raw.lines() {
        let lower = line.to_lowercase();
        if lower.contains("name server:") || lower.contains("nserver:") {
            if let Some((_, ns)) = line.split_once(':') {
                let ns = ns.trim().to_string();
                if !ns.is_empty() && !report.nameservers.contains(&ns) {
                    report.nameservers.push(ns);
                }
            }
        } else if lower.contains("domain status:") || lower.contains("status:") {
            if let Some((_, status)) = line.split_once(':') {
                let status = status.trim().to_string();
                if !status.is_empty() && status.len() < 100 && !report.status.contains(&status) {
                    report.status.push(status);
                }
            }
        }
    }
    report.status.truncate(10);

    let email_re = Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    for m in email_re.find_iter(raw) {
        let email = m.as_str().to_string();
        let lower = email.to_lowercase();
        // 过滤注册局模板里的占位邮箱
        if ["example.com", "please", "contact"]
            .iter()
            .any(|noise| lower.contains(noise))
        {
            continue;
        }
        if !report.emails.contains(&email) {
            report.emails.push(email);
        }
    }
    report.emails.truncate(5);

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Domain Name: EXAMPLE.COM
Registrar: IANA Reserved
Registrant Organization: Internet Assigned Numbers Authority
Creation Date: 1995-08-14T04:00:00Z
Registry Expiry Date: 2026-08-13T04:00:00Z
Updated Date: 2025-08-14T07:01:31Z
Name Server: A.IANA-SERVERS.NET
Name Server: B.IANA-SERVERS.NET
Name Server: A.IANA-SERVERS.NET
Domain Status: clientDeleteProhibited https://icann.org/epp
Registrar Abuse Contact Email: abuse@iana.org
For more information, please contact contact@example.com
";

    #[test]
    fn parses_core_fields() {
        let report = parse_whois("example.com", SAMPLE);
        assert_eq!(report.registrar.as_deref(), Some("iana reserved"));
        assert_eq!(
            report.registrant.as_deref(),
            Some("internet assigned numbers authority")
        );
        assert_eq!(report.created.as_deref(), Some("1995-08-14t04:00:00z"));
        assert!(report.expires.is_some());
        assert!(report.updated.is_some());
    }

    #[test]
    fn nameservers_are_deduplicated() {
        let report = parse_whois("example.com", SAMPLE);
        assert_eq!(
            report.nameservers,
            vec!["A.IANA-SERVERS.NET", "B.IANA-SERVERS.NET"]
        );
    }

    #[test]
    fn noise_emails_are_filtered() {
        let report = parse_whois("example.com", SAMPLE);
        assert_eq!(report.emails, vec!["abuse@iana.org"]);
    }

    #[test]
    fn empty_input_yields_empty_report() {
        let report = parse_whois("example.com", "");
        assert!(report.registrar.is_none());
        assert!(report.nameservers.is_empty());
        assert!(report.emails.is_empty());
    }
}
