use axon_core::error::CoreError;
use axon_db::store::StoreError;

/// Errors surfaced by orchestrator operations.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
