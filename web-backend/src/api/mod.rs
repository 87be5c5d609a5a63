use actix_web::{web, HttpResponse, Responder};

pub mod exif;
pub mod scan;
pub mod stream;
pub mod whois;

/// 注册完整 HTTP 路由 - main 与集成测试共用
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg
        // 健康检查：Electron 外壳轮询根路径判断就绪
        .route("/", web::get().to(readiness))
        .route("/health", web::get().to(health_check))
        .configure(scan::configure_scan_routes)
        .configure(stream::configure_stream_routes)
        .configure(whois::configure_whois_routes)
        .configure(exif::configure_exif_routes);
}

async fn readiness() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("ok")
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
