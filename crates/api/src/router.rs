//! Route table.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{analyses, documents, health, reports};
use crate::state::AppState;

/// Root-level routes (not under `/api/v1`).
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health::health))
}

/// Versioned API routes, nested under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/analyses", post(analyses::start_analysis))
        .route("/analyses/batch", post(analyses::start_batch_analysis))
        .route("/analyses/{id}", get(analyses::get_analysis))
        .route("/analyses/{id}/cancel", post(analyses::cancel_analysis))
        .route("/analyses/{id}/document", get(documents::analysis_document))
        .route("/reports", post(reports::consolidate))
        .route("/reports/{id}", get(reports::get_report))
        .route("/reports/{id}/document", get(documents::report_document))
        .route("/studies/{study_id}/analyses", get(analyses::list_study_analyses))
        .route("/studies/{study_id}/reports", get(reports::list_study_reports))
}
