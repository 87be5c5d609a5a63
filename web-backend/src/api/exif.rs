// ExifTool endpoint - 上传文件元数据分析
// 文件落入临时目录，分析完成后随 TempDir 一起清理

use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use chameleon_core::RelayError;
use futures_util::TryStreamExt;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

// 单文件上限 50MB，元数据分析用不到更大的文件
const UPLOAD_LIMIT: usize = 50 * 1024 * 1024;

pub fn configure_exif_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/exiftool/analyze", web::post().to(analyze_upload));
}

pub async fn analyze_upload(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> impl Responder {
    // 创建临时目录
    let temp_dir = match tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to create temp directory: {}", e)
            }));
        }
    };

    let mut saved: Option<(std::path::PathBuf, String)> = None;

    // 处理上传的文件
    loop {
        match payload.try_next().await {
            Ok(Some(mut field)) => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or("")
                    .to_string();
                if filename.is_empty() {
                    return HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "No file selected"
                    }));
                }

                let data = match field.bytes(UPLOAD_LIMIT).await {
                    Ok(Ok(bytes)) => Vec::from(bytes.as_ref()),
                    Ok(Err(e)) => {
                        return HttpResponse::BadRequest().json(serde_json::json!({
                            "error": format!("Failed to read upload: {}", e)
                        }));
                    }
                    Err(_) => {
                        return HttpResponse::BadRequest().json(serde_json::json!({
                            "error": "File too large"
                        }));
                    }
                };

                // 只取 basename，防止路径穿越
                let basename = Path::new(&filename)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".to_string());
                let path = temp_dir.path().join(&basename);

                let write_result = std::fs::File::create(&path)
                    .and_then(|mut f| f.write_all(&data));
                if let Err(e) = write_result {
                    return HttpResponse::InternalServerError().json(serde_json::json!({
                        "error": format!("Failed to save upload: {}", e)
                    }));
                }

                saved = Some((path, basename));
                break;
            }
            Ok(None) => break,
            Err(e) => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": format!("Invalid multipart payload: {}", e)
                }));
            }
        }
    }

    let Some((path, filename)) = saved else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "No file provided"
        }));
    };

    tracing::info!(%filename, "exiftool analysis requested");
    match chameleon_core::exif::analyze(state.tools.exiftool_bin.as_deref(), &path, &filename).await
    {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(RelayError::ToolMissing(_)) => HttpResponse::InternalServerError().json(
            serde_json::json!({
                "error": "ExifTool not found. Please install exiftool."
            }),
        ),
        Err(RelayError::Timeout(_)) => HttpResponse::InternalServerError().json(
            serde_json::json!({ "error": "ExifTool analysis timed out" }),
        ),
        Err(e) => {
            tracing::error!(%filename, error = %e, "exiftool analysis failed");
            HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": e.to_string() }))
        }
    }
}
