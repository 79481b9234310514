//! Application state for catalog service.

use std::sync::Arc;

use common::config::AppConfig;

use crate::pool::CatalogPool;
use crate::secrets::{PlaintextSecretStore, SecretStore};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pool: Arc<CatalogPool>,
    pub secrets: Arc<dyn SecretStore>,
}

impl AppState {
    /// Creates a new application state around an already initialized pool.
    pub fn new(config: AppConfig, pool: Arc<CatalogPool>) -> Self {
        Self {
            config,
            pool,
            secrets: Arc::new(PlaintextSecretStore),
        }
    }
}
