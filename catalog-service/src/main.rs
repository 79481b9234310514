//! 元数据目录服务
//!
//! 提供数据库结构元数据管理功能，包括：
//! - 远程数据库结构抽取（表、列、主键、外键）
//! - 原子化写入元数据目录
//! - 元数据查询与透传 SQL 执行

mod extractor;
mod handlers;
mod pool;
mod query;
mod reader;
mod routes;
mod schema;
mod secrets;
mod service;
mod state;
mod tx;
mod writer;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::AppConfig;
use common::middleware::request_id::request_id_middleware;
use pool::CatalogPool;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "catalog-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "元数据目录服务 API",
        version = "0.1.0",
        description = "远程数据库结构抽取与元数据目录微服务"
    ),
    paths(
        handlers::fill_metadata,
        handlers::list_databases,
        handlers::get_address,
        handlers::metadata_info,
        handlers::execute_query,
        handlers::query_list,
        handlers::health_check,
    ),
    components(schemas(
        common::models::Database,
        common::models::FillRequest,
        common::models::FillResponse,
        common::models::ExecuteQueryRequest,
        common::models::QueryResult,
        common::models::DatabaseMetadataInfo,
        common::models::TableSimpleView,
        common::models::SavedQueryItem,
        handlers::HealthResponse,
    )),
    tags(
        (name = "metadata", description = "元数据抽取与查询端点"),
        (name = "databases", description = "已登记数据库端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 文件可选，环境变量优先
    dotenvy::dotenv().ok();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME).context("加载配置失败")?;

    // 初始化日志追踪
    init_tracing(&config);

    // 创建元数据库连接池并建表
    let pool = Arc::new(CatalogPool::new(config.acquire_timeout()));
    pool.init(
        &config.database_url,
        config.pool_min_connections,
        config.pool_max_connections,
    )
    .await
    .context("初始化元数据库连接池失败")?;
    schema::ensure_schema(&pool)
        .await
        .context("初始化元数据表失败 (检查 CATALOG_DATABASE_URL)")?;

    let state = AppState::new(config.clone(), Arc::clone(&pool));

    // 创建路由
    let app = create_router(state);

    // 启动服务
    let addr = format!("{}:{}", config.host, config.port);
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务运行失败")?;

    pool.close().await;
    info!(service = SERVICE_NAME, "服务已停止");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "监听退出信号失败");
    }
    info!("收到退出信号，开始关闭");
}
