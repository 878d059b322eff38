//! Handlers for the `/reports` resource (consolidated study reports).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body for `POST /reports`.
#[derive(Debug, Deserialize)]
pub struct ConsolidateRequest {
    pub study_id: String,
    /// Analysis job ids to fold into the report, in presentation order.
    pub analysis_ids: Vec<String>,
}

/// POST /api/v1/reports
///
/// Consolidate completed analyses into one study-level report. Returns
/// 201 with the persisted report.
pub async fn consolidate(
    State(state): State<AppState>,
    Json(input): Json<ConsolidateRequest>,
) -> AppResult<impl IntoResponse> {
    if input.analysis_ids.is_empty() {
        return Err(AppError::BadRequest(
            "analysis_ids must not be empty".to_string(),
        ));
    }
    let report = state
        .orchestrator
        .consolidate(&input.study_id, &input.analysis_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: report })))
}

/// GET /api/v1/reports/{id}
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let report = state.orchestrator.get_report(&id).await?;
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/studies/{study_id}/reports
pub async fn list_study_reports(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let reports = state.orchestrator.list_reports_by_study(&study_id).await?;
    Ok(Json(DataResponse { data: reports }))
}
