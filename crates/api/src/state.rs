use std::sync::Arc;

use muninn_core::registry::ArchiveRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: muninn_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Every configured archive, with its tables, filters and shapes.
    pub registry: Arc<ArchiveRegistry>,
}
