//! 元数据目录服务公共模块
//!
//! 包含错误类型、配置、统一响应格式、数据模型、中间件与工具函数。

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
