// Stream endpoint - SSE 事件下发
// 固定间隔排空任务缓冲区；缓冲区为空时不发帧；done 刷出后关闭连接

use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use chameleon_core::JobRegistry;
use std::time::Duration;
use tokio::time::Interval;

const POLL_INTERVAL: Duration = Duration::from_millis(150);

pub fn configure_stream_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/stream/{job_id}", web::get().to(stream_job));
}

struct StreamState {
    registry: JobRegistry,
    job_id: String,
    interval: Interval,
    finished: bool,
}

pub async fn stream_job(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let job_id = path.into_inner();
    if !state.registry.exists(&job_id).await {
        tracing::info!(%job_id, "stream requested for unknown job");
        return HttpResponse::NotFound().finish();
    }
    tracing::info!(%job_id, "stream opened");

    let stream_state = StreamState {
        registry: state.registry.clone(),
        job_id,
        interval: tokio::time::interval(POLL_INTERVAL),
        finished: false,
    };

    // 客户端断开时响应流被 drop，轮询随之取消；任务本身继续运行
    let body = futures_util::stream::unfold(stream_state, |mut st| async move {
        if st.finished {
            tracing::info!(job_id = %st.job_id, "stream closed after done");
            return None;
        }
        loop {
            st.interval.tick().await;
            let drained = st.registry.drain(&st.job_id).await;
            if drained.finished {
                st.finished = true;
            }
            if drained.events.is_empty() {
                if st.finished {
                    tracing::info!(job_id = %st.job_id, "stream closed after done");
                    return None;
                }
                continue;
            }
            let mut payload = String::new();
            for event in &drained.events {
                payload.push_str("data: ");
                payload.push_str(event);
                payload.push_str("\n\n");
            }
            return Some((
                Ok::<_, actix_web::Error>(web::Bytes::from(payload)),
                st,
            ));
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(body)
}
