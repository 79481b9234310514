//! 元数据目录服务路由模块

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// 创建元数据目录路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/metadata/fill", post(handlers::fill_metadata))
        .route("/api/metadata/info", get(handlers::metadata_info))
        .route("/api/metadata/execute", post(handlers::execute_query))
        .route("/api/metadata/query_list", get(handlers::query_list))
        .route("/api/databases", get(handlers::list_databases))
        .route("/api/databases/{name}/address", get(handlers::get_address))
        .route("/api/health", get(handlers::health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::CatalogPool;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use common::config::AppConfig;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let pool = Arc::new(CatalogPool::new(Duration::from_secs(1)));
        router().with_state(AppState::new(AppConfig::default(), pool))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_fill_with_empty_dsn_is_bad_request() {
        let response = app()
            .oneshot(post_json("/api/metadata/fill", serde_json::json!({"dsn": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_fill_with_unsupported_scheme_is_bad_request() {
        let response = app()
            .oneshot(post_json(
                "/api/metadata/fill",
                serde_json::json!({"dsn": "oracle://u:p@h:1521/db"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_execute_rejects_writes() {
        let response = app()
            .oneshot(post_json(
                "/api/metadata/execute",
                serde_json::json!({"database_name": "shop", "sql_query": "DROP TABLE users"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_missing_catalog() {
        let response = app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["catalog"], false);
    }

    #[tokio::test]
    async fn test_list_without_pool_is_unavailable() {
        let response = app()
            .oneshot(Request::get("/api/databases").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
