use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use chameleon_core::tools::ToolConfig;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chameleon_web::api;
use chameleon_web::state::AppState;

const DEFAULT_PORT: u16 = 41234;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chameleon_web=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 初始化状态：工具路径从环境变量解析一次
    let state = AppState::new(ToolConfig::from_env());
    state.spawn_sweeper();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let bind_address = ("127.0.0.1", port);
    tracing::info!("Chameleon relay listening on {}:{}", bind_address.0, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .configure(api::configure_app)
    })
    .bind(bind_address)?
    .run()
    .await?;

    Ok(())
}
