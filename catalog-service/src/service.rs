//! 元数据目录服务模块

use std::sync::Arc;

use async_trait::async_trait;

use common::errors::AppResult;
use common::models::catalog::Database;
use common::models::metadata::{DatabaseMetadataInfo, QueryResult, SavedQueryItem};

use crate::extractor::ExtractorTimeouts;
use crate::query::QueryExecutor;
use crate::reader::CatalogReader;
use crate::state::AppState;
use crate::writer::{CatalogWriter, FillSummary};

/// 元数据服务 Trait
#[async_trait]
pub trait MetadataServiceTrait: Send + Sync {
    /// 抽取目标库结构并落库
    async fn fill(&self, dsn: &str) -> AppResult<FillSummary>;

    /// 列出所有已登记的数据库
    async fn list_databases(&self) -> AppResult<Vec<Database>>;

    /// 查询数据库地址 (`host:port`)
    async fn get_address(&self, database_name: &str) -> AppResult<String>;

    /// 数据库 -> 表 -> 列 的嵌套视图
    async fn metadata_info(&self) -> AppResult<Vec<DatabaseMetadataInfo>>;

    /// 在目标库上执行查询，并记录到查询历史
    async fn execute(&self, database_name: &str, sql: &str) -> AppResult<QueryResult>;

    /// 查询历史
    async fn list_saved_queries(&self) -> AppResult<Vec<SavedQueryItem>>;
}

/// 元数据目录服务
pub struct MetadataService {
    writer: CatalogWriter,
    reader: CatalogReader,
    executor: QueryExecutor,
}

impl MetadataService {
    /// 根据应用状态创建服务实例
    pub fn new(state: &AppState) -> Self {
        let timeouts = ExtractorTimeouts::from_config(&state.config);
        let reader = CatalogReader::new(Arc::clone(&state.pool));
        Self {
            writer: CatalogWriter::new(
                Arc::clone(&state.pool),
                Arc::clone(&state.secrets),
                timeouts,
                state.config.default_schema.clone(),
            ),
            executor: QueryExecutor::new(reader.clone(), Arc::clone(&state.secrets), timeouts),
            reader,
        }
    }
}

#[async_trait]
impl MetadataServiceTrait for MetadataService {
    async fn fill(&self, dsn: &str) -> AppResult<FillSummary> {
        self.writer.fill(dsn).await
    }

    async fn list_databases(&self) -> AppResult<Vec<Database>> {
        self.reader.list_databases().await
    }

    async fn get_address(&self, database_name: &str) -> AppResult<String> {
        self.reader.get_address(database_name).await
    }

    async fn metadata_info(&self) -> AppResult<Vec<DatabaseMetadataInfo>> {
        self.reader.metadata_info().await
    }

    async fn execute(&self, database_name: &str, sql: &str) -> AppResult<QueryResult> {
        let result = self.executor.execute(database_name, sql).await?;

        // 查询历史记录失败不影响本次查询结果
        if let Err(e) = self.writer.save_query(database_name, sql).await {
            tracing::warn!(database = %database_name, error = %e, "保存查询历史失败");
        }
        Ok(result)
    }

    async fn list_saved_queries(&self) -> AppResult<Vec<SavedQueryItem>> {
        self.reader.list_saved_queries().await
    }
}
