// ==========================================
// 考试排期系统 - 服务主入口
// ==========================================
// 技术栈: axum + Rust + SQLite
// 提供: 考试管理 HTTP 接口 + 实时通知 WebSocket
// ==========================================

use anyhow::Context;
use std::sync::Arc;

use exam_scheduler::app::{build_router, AppState};
use exam_scheduler::config::AppConfig;
use exam_scheduler::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", exam_scheduler::APP_NAME);
    tracing::info!("系统版本: {}", exam_scheduler::VERSION);
    tracing::info!("==================================================");

    let config = AppConfig::from_env().context("启动配置无效")?;
    tracing::info!("使用数据库: {}", config.db_path);

    let state = AppState::new(&config)
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;
    let router = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("无法监听地址 {}", config.bind_addr))?;
    tracing::info!("服务已启动: http://{}", config.bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP 服务异常退出")?;

    tracing::info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("收到退出信号，正在关闭");
}
