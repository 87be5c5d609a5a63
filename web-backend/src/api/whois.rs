// WHOIS endpoint - 域名注册信息查询
// 同步查询，直接返回解析结果，不走任务/流式通道

use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use chameleon_core::RelayError;
use serde::Deserialize;

pub fn configure_whois_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/whois/lookup", web::get().to(lookup_domain));
}

#[derive(Deserialize)]
pub struct WhoisQuery {
    pub domain: Option<String>,
}

pub async fn lookup_domain(
    state: web::Data<AppState>,
    query: web::Query<WhoisQuery>,
) -> impl Responder {
    let domain = match query.domain.as_deref() {
        Some(d) if !d.trim().is_empty() => d.trim().to_string(),
        _ => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Domain parameter is required"
            }));
        }
    };

    tracing::info!(%domain, "whois lookup");
    match chameleon_core::whois::lookup(state.tools.whois_bin.as_deref(), &domain).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(RelayError::ToolMissing(_)) => HttpResponse::InternalServerError().json(
            serde_json::json!({
                "error": "WHOIS command not found. Please install whois tool."
            }),
        ),
        Err(RelayError::Timeout(_)) => HttpResponse::InternalServerError().json(
            serde_json::json!({ "error": "WHOIS lookup timed out" }),
        ),
        Err(RelayError::ToolFailed(stderr)) => {
            tracing::warn!(%domain, %stderr, "whois command failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to lookup domain",
                "details": stderr
            }))
        }
        Err(e) => {
            tracing::error!(%domain, error = %e, "whois lookup error");
            HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": e.to_string() }))
        }
    }
}
