// ExifTool analysis - 文件元数据分析
// 同步一次性子进程：exiftool -json -a -G，外加文件类型探测

use crate::error::RelayError;
use crate::tools::resolve_binary;
use chrono::{DateTime, Local};
use md5::Md5;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const ANALYZE_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const LAT_KEYS: &[&str] = &["GPS:GPSLatitude", "EXIF:GPSLatitude", "Composite:GPSLatitude"];
const LON_KEYS: &[&str] = &["GPS:GPSLongitude", "EXIF:GPSLongitude", "Composite:GPSLongitude"];
const ALT_KEYS: &[&str] = &["GPS:GPSAltitude", "EXIF:GPSAltitude", "Composite:GPSAltitude"];

const DEVICE_KEYS: &[(&str, &[&str])] = &[
    ("make", &["EXIF:Make", "IFD0:Make"]),
    ("model", &["EXIF:Model", "IFD0:Model"]),
    ("software", &["EXIF:Software", "IFD0:Software", "XMP:CreatorTool"]),
    ("lensModel", &["EXIF:LensModel", "XMP:LensModel"]),
    ("serialNumber", &["EXIF:SerialNumber", "MakerNotes:SerialNumber"]),
];

/// 时间戳分析关注的标签
const TIMESTAMP_KEYS: &[&str] = &[
    "File:FileModifyDate",
    "File:FileAccessDate",
    "File:FileCreateDate",
    "EXIF:CreateDate",
    "EXIF:ModifyDate",
    "EXIF:DateTimeOriginal",
    "XMP:CreateDate",
    "XMP:ModifyDate",
    "QuickTime:CreateDate",
    "QuickTime:ModifyDate",
];

/// 扩展名与 exiftool FileType 的常见对应
const EXTENSION_TYPES: &[(&str, &str)] = &[
    (".jpg", "jpeg"),
    (".jpeg", "jpeg"),
    (".png", "png"),
    (".gif", "gif"),
    (".bmp", "bmp"),
    (".tiff", "tiff"),
    (".tif", "tiff"),
    (".pdf", "pdf"),
    (".doc", "doc"),
    (".docx", "docx"),
    (".mp4", "mp4"),
    (".mov", "mov"),
    (".avi", "avi"),
    (".mp3", "mp3"),
    (".wav", "wav"),
    (".m4a", "m4a"),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsData {
    #[serde(rename = "hasGPS")]
    pub has_gps: bool,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub altitude: Option<String>,
    pub map_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileHashes {
    #[serde(rename = "MD5")]
    pub md5: String,
    #[serde(rename = "SHA256")]
    pub sha256: String,
}

/// 扩展名与实际文件类型的一致性检查结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVerification {
    pub extension_matches: bool,
    pub warning: Option<String>,
    pub declared_type: Option<String>,
    pub actual_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimestampAnalysis {
    pub timestamps: serde_json::Map<String, Value>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    pub size: u64,
    pub size_human: String,
    pub modified: Option<String>,
    pub created: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifReport {
    pub success: bool,
    pub filename: String,
    pub metadata: Value,
    pub hashes: FileHashes,
    pub gps_data: GpsData,
    pub device_info: serde_json::Map<String, Value>,
    pub file_verification: FileVerification,
    pub timestamp_analysis: TimestampAnalysis,
    pub file_stats: FileStats,
}

/// 对单个上传文件执行 exiftool 分析
pub async fn analyze(
    binary_override: Option<&Path>,
    path: &Path,
    filename: &str,
) -> Result<ExifReport, RelayError> {
    let binary = resolve_binary(binary_override, "exiftool", &["/usr/bin/exiftool"])
        .ok_or(RelayError::ToolMissing("exiftool"))?;

    let output = tokio::time::timeout(
        ANALYZE_TIMEOUT,
        Command::new(&binary)
            .arg("-json")
            .arg("-a")
            .arg("-G")
            .arg(path)
            .stdin(Stdio::null())
            .output(),
    )
    .await
    .map_err(|_| RelayError::Timeout("exiftool"))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(RelayError::ToolFailed(stderr));
    }

    let parsed: Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| RelayError::Artifact(e.to_string()))?;
    let metadata = parsed
        .as_array()
        .and_then(|a| a.first())
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    let contents = tokio::fs::read(path).await?;
    let hashes = hash_contents(&contents);

    let actual_type = probe_file_type(&binary, path).await;
    let file_verification =
        build_verification(declared_extension(filename).as_deref(), actual_type.as_deref());

    let file_stats = stat_file(path).await?;
    let gps_data = extract_gps(&metadata);
    let device_info = extract_device_info(&metadata);
    let timestamp_analysis = analyze_timestamps(&metadata);

    Ok(ExifReport {
        success: true,
        filename: filename.to_string(),
        metadata,
        hashes,
        gps_data,
        device_info,
        file_verification,
        timestamp_analysis,
        file_stats,
    })
}

pub fn hash_contents(data: &[u8]) -> FileHashes {
    FileHashes {
        md5: hex::encode(Md5::digest(data)),
        sha256: hex::encode(Sha256::digest(data)),
    }
}

fn declared_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
}

/// exiftool -FileType 探测；失败按未知处理，不影响主流程
async fn probe_file_type(binary: &PathBuf, path: &Path) -> Option<String> {
    let output = tokio::time::timeout(
        PROBE_TIMEOUT,
        Command::new(binary)
            .args(["-FileType", "-MIMEType", "-s3"])
            .arg(path)
            .stdin(Stdio::null())
            .output(),
    )
    .await
    .ok()?
    .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
}

/// 声明的扩展名与探测到的类型比对；只对已知映射里的扩展名告警
pub fn build_verification(declared: Option<&str>, actual: Option<&str>) -> FileVerification {
    let mut verification = FileVerification {
        extension_matches: true,
        warning: None,
        declared_type: declared.map(str::to_string),
        actual_type: actual.map(str::to_string),
    };

    if let (Some(ext), Some(actual)) = (declared, actual) {
        let expected = EXTENSION_TYPES
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, t)| *t);
        if let Some(expected) = expected {
            if expected != actual {
                verification.extension_matches = false;
                verification.warning = Some(format!(
                    "File extension '{ext}' does not match actual file type '{actual}'. \
                     This could indicate file spoofing or renaming."
                ));
            }
        }
    }
    verification
}

/// 汇总元数据里的时间戳并标记可疑差异
pub fn analyze_timestamps(metadata: &Value) -> TimestampAnalysis {
    let mut timestamps = serde_json::Map::new();
    for key in TIMESTAMP_KEYS {
        if let Some(value) = metadata.get(*key) {
            timestamps.insert((*key).to_string(), Value::String(value_text(value)));
        }
    }

    let mut warnings = Vec::new();
    if let (Some(original), Some(modified)) = (
        timestamps.get("EXIF:DateTimeOriginal"),
        timestamps.get("File:FileModifyDate"),
    ) {
        if original != modified {
            warnings.push(
                "File modification date differs from original creation date - \
                 file may have been edited or metadata modified"
                    .to_string(),
            );
        }
    }
    if timestamps.len() > 1 {
        warnings.push(format!(
            "Found {} different timestamps - review for consistency",
            timestamps.len()
        ));
    }

    TimestampAnalysis {
        timestamps,
        warnings,
    }
}

fn metadata_field(metadata: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| metadata.get(*key).map(value_text))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 探测各 GPS 标签变体，经纬齐全时拼出 OpenStreetMap 链接
pub fn extract_gps(metadata: &Value) -> GpsData {
    let latitude = metadata_field(metadata, LAT_KEYS);
    let longitude = metadata_field(metadata, LON_KEYS);
    let altitude = metadata_field(metadata, ALT_KEYS);
    let has_gps = latitude.is_some();

    let map_url = match (&latitude, &longitude) {
        (Some(lat), Some(lon)) => {
            let lat = strip_dms(lat, &['N', 'S']);
            let lon = strip_dms(lon, &['E', 'W']);
            Some(format!(
                "https://www.openstreetmap.org/?mlat={lat}&mlon={lon}&zoom=15"
            ))
        }
        _ => None,
    };

    GpsData {
        has_gps,
        latitude,
        longitude,
        altitude,
        map_url,
    }
}

// exiftool 输出如 `37 deg 46' 30.00" N`，粗略清理为数值串
fn strip_dms(value: &str, hemispheres: &[char]) -> String {
    let mut out = value.replace("deg", "").replace('\'', "").replace('"', "");
    for h in hemispheres {
        out = out.replace(*h, "");
    }
    out.trim().to_string()
}

pub fn extract_device_info(metadata: &Value) -> serde_json::Map<String, Value> {
    let mut info = serde_json::Map::new();
    for (field, keys) in DEVICE_KEYS {
        if let Some(value) = metadata_field(metadata, keys) {
            info.insert((*field).to_string(), Value::String(value));
        }
    }
    info
}

async fn stat_file(path: &Path) -> Result<FileStats, RelayError> {
    let meta = tokio::fs::metadata(path).await?;
    let modified = meta
        .modified()
        .ok()
        .map(|t| DateTime::<Local>::from(t).to_rfc3339());
    let created = created_time(&meta).map(|t| DateTime::<Local>::from(t).to_rfc3339());
    Ok(FileStats {
        size: meta.len(),
        size_human: format_bytes(meta.len()),
        modified,
        created,
    })
}

#[cfg(unix)]
fn created_time(meta: &std::fs::Metadata) -> Option<std::time::SystemTime> {
    use std::os::unix::fs::MetadataExt;
    u64::try_from(meta.ctime())
        .ok()
        .map(|secs| std::time::UNIX_EPOCH + Duration::from_secs(secs))
}

#[cfg(not(unix))]
fn created_time(meta: &std::fs::Metadata) -> Option<std::time::SystemTime> {
    meta.created().ok()
}

pub fn format_bytes(size: u64) -> String {
    let mut size = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}
