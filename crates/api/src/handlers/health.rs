//! Service health: database plus both inference backends.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// GET /health
///
/// `503` only when the database is down; unhealthy model backends
/// degrade the status but keep the service up, since partial analysis
/// remains possible.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database_up = axon_db::health_check(&state.pool).await.is_ok();
    let backends = state.orchestrator.backend_health().await;
    let active_jobs = state.orchestrator.active_job_count().await;

    let all_healthy =
        database_up && backends.classifier.healthy && backends.report_generator.healthy;
    let status = if all_healthy { "ok" } else { "degraded" };
    let code = if database_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(json!({
            "status": status,
            "database": if database_up { "up" } else { "down" },
            "backends": backends,
            "active_jobs": active_jobs,
        })),
    )
}
