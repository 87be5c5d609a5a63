// Scan endpoints - 扫描请求入口
// 校验请求字段，登记任务，立即返回 jobId；扫描在后台进行

use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use chameleon_core::start_scan;
use chameleon_core::tools::harvester::{HarvesterAdapter, HarvesterOptions};
use chameleon_core::tools::holehe::HoleheAdapter;
use chameleon_core::tools::maigret::MaigretAdapter;
use chameleon_core::tools::sherlock::SherlockAdapter;
use chameleon_core::ToolAdapter;
use serde::Deserialize;
use std::sync::Arc;

pub fn configure_scan_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/scan", web::post().to(start_sherlock_scan))
        .route("/maigret/scan", web::post().to(start_maigret_scan))
        .route("/holehe/scan", web::post().to(start_holehe_scan))
        .route("/harvester/scan", web::post().to(start_harvester_scan));
}

#[derive(Deserialize)]
pub struct SherlockScanRequest {
    pub query: Option<String>,
}

#[derive(Deserialize)]
pub struct MaigretScanRequest {
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct HoleheScanRequest {
    pub email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvesterScanRequest {
    pub domain: Option<String>,
    #[serde(default)]
    pub dns_resolve: bool,
    #[serde(default)]
    pub dns_brute: bool,
    pub sources: Option<String>,
}

/// 请求字段必须存在且为非空字符串，否则 400 且不创建任务
fn required(value: &Option<String>, name: &str) -> Result<String, HttpResponse> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => {
            tracing::info!(field = name, "invalid scan request");
            Err(HttpResponse::BadRequest()
                .json(serde_json::json!({ "error": format!("missing {name}") })))
        }
    }
}

async fn launch(state: &AppState, adapter: Arc<dyn ToolAdapter>, query: String) -> HttpResponse {
    tracing::info!(tool = adapter.name(), %query, "scan requested");
    let job_id = start_scan(&state.registry, adapter, query).await;
    tracing::info!(%job_id, "scan started");
    HttpResponse::Ok().json(serde_json::json!({ "jobId": job_id }))
}

pub async fn start_sherlock_scan(
    state: web::Data<AppState>,
    req: web::Json<SherlockScanRequest>,
) -> impl Responder {
    let query = match required(&req.query, "query") {
        Ok(query) => query,
        Err(resp) => return resp,
    };
    let adapter = Arc::new(SherlockAdapter::new(state.tools.sherlock_bin.clone()));
    launch(&state, adapter, query).await
}

pub async fn start_maigret_scan(
    state: web::Data<AppState>,
    req: web::Json<MaigretScanRequest>,
) -> impl Responder {
    let username = match required(&req.username, "username") {
        Ok(username) => username,
        Err(resp) => return resp,
    };
    let adapter = Arc::new(MaigretAdapter::new(state.tools.maigret_bin.clone()));
    launch(&state, adapter, username).await
}

pub async fn start_holehe_scan(
    state: web::Data<AppState>,
    req: web::Json<HoleheScanRequest>,
) -> impl Responder {
    let email = match required(&req.email, "email") {
        Ok(email) => email,
        Err(resp) => return resp,
    };
    let adapter = Arc::new(HoleheAdapter::new(state.tools.holehe_bin.clone()));
    launch(&state, adapter, email).await
}

pub async fn start_harvester_scan(
    state: web::Data<AppState>,
    req: web::Json<HarvesterScanRequest>,
) -> impl Responder {
    let domain = match required(&req.domain, "domain") {
        Ok(domain) => domain,
        Err(resp) => return resp,
    };
    let options = HarvesterOptions {
        dns_resolve: req.dns_resolve,
        dns_brute: req.dns_brute,
        sources: req
            .sources
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| HarvesterOptions::default().sources),
    };
    let adapter = Arc::new(HarvesterAdapter::new(
        state.tools.harvester_bin.clone(),
        options,
    ));
    launch(&state, adapter, domain).await
}
