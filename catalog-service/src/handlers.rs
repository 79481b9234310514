//! Handler模块

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use common::errors::AppError;
use common::models::catalog::Database;
use common::models::metadata::{
    DatabaseMetadataInfo, ExecuteQueryRequest, FillRequest, FillResponse, QueryResult,
    SavedQueryItem,
};
use common::response::ApiResponse;
use crate::service::{MetadataService, MetadataServiceTrait};
use crate::state::AppState;
use crate::SERVICE_NAME;

/// 抽取目标库结构并写入元数据目录
#[utoipa::path(
    post,
    path = "/api/metadata/fill",
    tag = "metadata",
    request_body = FillRequest,
    responses(
        (status = 200, description = "落库完成", body = ApiResponse<FillResponse>),
        (status = 400, description = "连接串无效"),
        (status = 502, description = "目标库不可达")
    )
)]
pub async fn fill_metadata(
    State(state): State<AppState>,
    Json(req): Json<FillRequest>,
) -> Result<Json<ApiResponse<FillResponse>>, AppError> {
    req.validate()?;
    let service = MetadataService::new(&state);
    service.fill(&req.dsn).await?;
    Ok(Json(ApiResponse::ok_with_service(
        FillResponse {
            status: "ok".to_string(),
            dsn: req.dsn,
        },
        SERVICE_NAME,
    )))
}

/// 列出所有已登记的数据库
#[utoipa::path(
    get,
    path = "/api/databases",
    tag = "databases",
    responses(
        (status = 200, description = "数据库列表", body = ApiResponse<Vec<Database>>)
    )
)]
pub async fn list_databases(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Database>>>, AppError> {
    let service = MetadataService::new(&state);
    let data = service.list_databases().await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// 查询数据库地址
#[utoipa::path(
    get,
    path = "/api/databases/{name}/address",
    tag = "databases",
    params(
        ("name" = String, Path, description = "数据库名称")
    ),
    responses(
        (status = 200, description = "host:port", body = ApiResponse<String>),
        (status = 404, description = "数据库未找到")
    )
)]
pub async fn get_address(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<String>>, AppError> {
    let service = MetadataService::new(&state);
    let data = service.get_address(&name).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// 数据库 / 表 / 列 嵌套视图
#[utoipa::path(
    get,
    path = "/api/metadata/info",
    tag = "metadata",
    responses(
        (status = 200, description = "元数据视图", body = ApiResponse<Vec<DatabaseMetadataInfo>>)
    )
)]
pub async fn metadata_info(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<DatabaseMetadataInfo>>>, AppError> {
    let service = MetadataService::new(&state);
    let data = service.metadata_info().await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// 在已登记的数据库上执行查询
#[utoipa::path(
    post,
    path = "/api/metadata/execute",
    tag = "metadata",
    request_body = ExecuteQueryRequest,
    responses(
        (status = 200, description = "查询结果", body = ApiResponse<QueryResult>),
        (status = 400, description = "SQL 不合法"),
        (status = 404, description = "数据库未找到")
    )
)]
pub async fn execute_query(
    State(state): State<AppState>,
    Json(req): Json<ExecuteQueryRequest>,
) -> Result<Json<ApiResponse<QueryResult>>, AppError> {
    req.validate()?;
    let service = MetadataService::new(&state);
    let data = service.execute(&req.database_name, &req.sql_query).await?;
    let elapsed = data.execution_time_ms;
    Ok(Json(
        ApiResponse::ok_with_service(data, SERVICE_NAME).with_duration(elapsed),
    ))
}

/// 查询历史
#[utoipa::path(
    get,
    path = "/api/metadata/query_list",
    tag = "metadata",
    responses(
        (status = 200, description = "查询历史", body = ApiResponse<Vec<SavedQueryItem>>)
    )
)]
pub async fn query_list(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<SavedQueryItem>>>, AppError> {
    let service = MetadataService::new(&state);
    let data = service.list_saved_queries().await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行状态", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let catalog = state.pool.health_check().await;
    Json(HealthResponse {
        status: if catalog { "healthy" } else { "degraded" }.to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        catalog,
    })
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 服务名称
    pub service: String,
    /// 服务版本
    pub version: String,
    /// 当前时间戳
    pub timestamp: DateTime<Utc>,
    /// 元数据库是否可用
    pub catalog: bool,
}
