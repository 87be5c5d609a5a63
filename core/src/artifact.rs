// Artifact extraction helpers - 产物文件定位与容错取列
// 各工具版本间的落盘约定略有差异，文件查找和取列都保持宽容

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// 非字母数字字符替换为 `_`，与各工具从查询推导输出文件名的规则一致
pub fn sanitize_query(query: &str) -> String {
    query
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// 在 dir 中定位 query 的产物：优先精确的净化文件名，
/// 否则回退到同扩展名中 mtime 最新的文件；无候选返回 None
pub async fn locate_artifact(dir: &Path, query: &str, extension: &str) -> Option<PathBuf> {
    let exact = dir.join(format!("{}.{}", sanitize_query(query), extension));
    if tokio::fs::try_exists(&exact).await.unwrap_or(false) {
        return Some(exact);
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if !matches_ext {
            continue;
        }
        let modified = entry
            .metadata()
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().map_or(true, |(at, _)| modified > *at) {
            newest = Some((modified, path));
        }
    }
    newest.map(|(_, path)| path)
}

/// 按表头索引的单行视图 - 依序探测多个候选列名后才判定字段缺失
pub struct RowView<'a> {
    headers: &'a csv::StringRecord,
    record: &'a csv::StringRecord,
}

impl<'a> RowView<'a> {
    pub fn new(headers: &'a csv::StringRecord, record: &'a csv::StringRecord) -> Self {
        Self { headers, record }
    }

    /// 按序探测候选列名，返回第一个非空值；表头按工具输出原样精确比较
    pub fn field(&self, candidates: &[&str]) -> Option<&'a str> {
        for candidate in candidates {
            let Some(index) = self.headers.iter().position(|h| h == *candidate) else {
                continue;
            };
            match self.record.get(index) {
                Some(value) if !value.trim().is_empty() => return Some(value.trim()),
                _ => continue,
            }
        }
        None
    }
}

/// 行判定：状态列含 found/claimed 或布尔 true，或 URL 列非空即为命中
pub fn row_is_positive(status: Option<&str>, url: Option<&str>) -> bool {
    let status = status.unwrap_or("").to_uppercase();
    status.contains("FOUND")
        || status.contains("CLAIMED")
        || status == "TRUE"
        || url.map_or(false, |u| !u.trim().is_empty())
}
