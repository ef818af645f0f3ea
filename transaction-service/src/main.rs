//! 账户交易明细查询服务
//!
//! 对外提供只读接口 `GET /transactions`，功能包括：
//! - 校验 AccountNumber 参数
//! - 每个请求独占一个 SQL Server 连接，请求结束时释放
//! - 调用存储过程 GetTransDetail 并按列名返回 JSON 数组

mod connection;
mod handlers;
mod mssql;
mod routes;
mod service;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Context;
use common::config::AppConfig;
use state::AppState;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "transaction-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "交易查询服务 API",
        version = "0.1.0",
        description = "GetTransDetail 存储过程网关"
    ),
    paths(
        handlers::get_transactions,
        handlers::index,
        handlers::health_check,
    ),
    components(schemas(
        common::response::ErrorBody,
        handlers::ServiceInfo,
        handlers::HealthResponse,
    )),
    tags(
        (name = "transactions", description = "交易查询端点"),
        (name = "service", description = "服务信息端点"),
        (name = "health", description = "健康检查端点")
    )
)]
pub(crate) struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 不存在时忽略
    dotenv::dotenv().ok();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置（数据库配置缺失只记录错误，不阻止启动）
    let config = AppConfig::load_with_service(SERVICE_NAME);
    let addr = config.bind_addr();

    let state = AppState::new(config);
    let app = routes::create_router(state);

    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务运行失败")?;

    info!(service = SERVICE_NAME, "服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "无法监听 Ctrl-C 信号");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "无法监听 SIGTERM 信号");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
