use std::sync::Arc;

use axon_orchestrator::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`. Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (used directly by the health handler).
    pub pool: axon_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Analysis pipeline facade.
    pub orchestrator: Arc<Orchestrator>,
}
