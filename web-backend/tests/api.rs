// HTTP 层集成测试：路由、校验、SSE 生命周期
// 扫描管线用普通系统命令顶替 OSINT 工具，不依赖真实二进制

use actix_web::{test, web, App};
use chameleon_core::tools::ToolConfig;
use chameleon_web::api;
use chameleon_web::state::AppState;
use std::path::PathBuf;

fn app_state(tools: ToolConfig) -> web::Data<AppState> {
    web::Data::new(AppState::new(tools))
}

#[actix_web::test]
async fn readiness_returns_plain_ok() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(ToolConfig::default()))
            .configure(api::configure_app),
    )
    .await;

    let req = test::TestRequest::get().uri("/").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "ok");
}

#[actix_web::test]
async fn health_reports_version() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(ToolConfig::default()))
            .configure(api::configure_app),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[actix_web::test]
async fn scan_without_query_is_rejected() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(ToolConfig::default()))
            .configure(api::configure_app),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/scan")
        .set_json(serde_json::json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "missing query");
}

#[actix_web::test]
async fn holehe_scan_requires_email() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(ToolConfig::default()))
            .configure(api::configure_app),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/holehe/scan")
        .set_json(serde_json::json!({ "email": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "missing email");
}

#[actix_web::test]
async fn stream_for_unknown_job_is_404() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(ToolConfig::default()))
            .configure(api::configure_app),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/stream/doesnotexist")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn whois_without_domain_is_rejected() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(ToolConfig::default()))
            .configure(api::configure_app),
    )
    .await;

    let req = test::TestRequest::get().uri("/whois/lookup").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Domain parameter is required");
}

#[actix_web::test]
async fn exiftool_without_file_is_rejected() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(ToolConfig::default()))
            .configure(api::configure_app),
    )
    .await;

    let boundary = "------------------------testboundary";
    let body = format!("--{boundary}--\r\n");
    let req = test::TestRequest::post()
        .uri("/exiftool/analyze")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "No file provided");
}

#[actix_web::test]
async fn exiftool_upload_reaches_analysis() {
    // 分析器二进制不可用时上传仍被接收，错误以 JSON 返回
    let tools = ToolConfig {
        exiftool_bin: Some(PathBuf::from("/nonexistent/exiftool")),
        ..ToolConfig::default()
    };
    let app = test::init_service(
        App::new()
            .app_data(app_state(tools))
            .configure(api::configure_app),
    )
    .await;

    let boundary = "------------------------testboundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"photo.jpg\"\r\n\
         \r\n\
         not really a jpeg\r\n\
         --{boundary}--\r\n"
    );
    let req = test::TestRequest::post()
        .uri("/exiftool/analyze")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}

// 解析一整段 SSE 响应体为 JSON 事件序列
fn parse_sse(body: &[u8]) -> Vec<serde_json::Value> {
    let text = String::from_utf8_lossy(body);
    text.split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|json| serde_json::from_str(json).unwrap())
        .collect()
}

#[actix_web::test]
async fn scan_pipeline_streams_events_and_closes_after_done() {
    let tools = ToolConfig {
        // echo 不产出 CSV，管线应以提示日志 + done 收尾
        sherlock_bin: Some(PathBuf::from("/bin/echo")),
        ..ToolConfig::default()
    };
    let app = test::init_service(
        App::new()
            .app_data(app_state(tools))
            .configure(api::configure_app),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/scan")
        .set_json(serde_json::json!({ "query": "someuser" }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let job_id = resp["jobId"].as_str().unwrap().to_string();
    assert!(!job_id.is_empty());

    // 流在 done 刷出后自行结束，读到 EOF 即拿到完整事件序列
    let req = test::TestRequest::get()
        .uri(&format!("/stream/{job_id}"))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    let events = parse_sse(&body);

    assert!(!events.is_empty());
    assert_eq!(events.last().unwrap()["type"], "done");
    let done_count = events.iter().filter(|e| e["type"] == "done").count();
    assert_eq!(done_count, 1);
    assert!(events
        .iter()
        .any(|e| e["type"] == "log"
            && e["text"].as_str().unwrap().contains("No CSV file produced")));
}

#[actix_web::test]
async fn spawn_failure_surfaces_as_log_then_done() {
    let tools = ToolConfig {
        holehe_bin: Some(PathBuf::from("/nonexistent/holehe")),
        ..ToolConfig::default()
    };
    let app = test::init_service(
        App::new()
            .app_data(app_state(tools))
            .configure(api::configure_app),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/holehe/scan")
        .set_json(serde_json::json!({ "email": "someone@example.com" }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let job_id = resp["jobId"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/stream/{job_id}"))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    let events = parse_sse(&body);

    assert_eq!(events.last().unwrap()["type"], "done");
    assert!(events
        .iter()
        .any(|e| e["type"] == "log"
            && e["text"].as_str().unwrap().contains("spawn error")));
    assert!(events.iter().all(|e| e["type"] != "result"));
}

#[actix_web::test]
async fn stream_is_drained_once() {
    let tools = ToolConfig {
        sherlock_bin: Some(PathBuf::from("/bin/true")),
        ..ToolConfig::default()
    };
    let app = test::init_service(
        App::new()
            .app_data(app_state(tools))
            .configure(api::configure_app),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/scan")
        .set_json(serde_json::json!({ "query": "someuser" }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let job_id = resp["jobId"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/stream/{job_id}"))
        .to_request();
    let first = test::call_and_read_body(&app, req).await;
    assert!(parse_sse(&first).iter().any(|e| e["type"] == "done"));

    // 任务仍在登记表里（等待清扫），重连只会拿到空余量后立即收流
    let req = test::TestRequest::get()
        .uri(&format!("/stream/{job_id}"))
        .to_request();
    let second = test::call_and_read_body(&app, req).await;
    assert!(parse_sse(&second).is_empty());
}
