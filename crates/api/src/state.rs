use std::sync::Arc;

use crate::config::ServerConfig;
use crate::services::template_storage::TemplateStorage;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: pagekit_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Blob + extraction storage for templates.
    pub storage: Arc<TemplateStorage>,
}

impl AppState {
    /// Build the state, wiring the storage service to the configured
    /// templates directory.
    pub fn new(pool: pagekit_db::DbPool, config: ServerConfig) -> Self {
        let storage = Arc::new(TemplateStorage::new(pool.clone(), &config.templates_dir));
        Self {
            pool,
            config: Arc::new(config),
            storage,
        }
    }
}
