//! Handlers for the `/analyses` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use axon_core::fusion::PatientContext;
use axon_core::job::Subject;
use axon_orchestrator::AnalysisRequest;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body for `POST /analyses`.
#[derive(Debug, Deserialize)]
pub struct StartAnalysis {
    pub study_id: String,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub frame_index: u32,
    pub modality: String,
    #[serde(default)]
    pub patient_context: Option<PatientContext>,
    /// Bypass the completed-analysis cache.
    #[serde(default)]
    pub force_reanalyze: bool,
}

/// Body for `POST /analyses/batch`.
#[derive(Debug, Deserialize)]
pub struct StartBatchAnalysis {
    pub study_id: String,
    #[serde(default)]
    pub series_id: Option<String>,
    pub frame_count: u32,
    /// Analyze every Nth frame (default: every frame).
    #[serde(default)]
    pub sample_rate: Option<u32>,
    pub modality: String,
    #[serde(default)]
    pub patient_context: Option<PatientContext>,
}

/// POST /api/v1/analyses
///
/// Analyze one frame synchronously with both models. Returns 201 with
/// the terminal job, or the cached completed job for the same frame.
pub async fn start_analysis(
    State(state): State<AppState>,
    Json(input): Json<StartAnalysis>,
) -> AppResult<impl IntoResponse> {
    let request = AnalysisRequest {
        subject: Subject {
            study_id: input.study_id,
            series_id: input.series_id,
            instance_id: input.instance_id,
            frame_index: input.frame_index,
            frame_count: None,
            sample_rate: None,
        },
        modality: input.modality,
        patient_context: input.patient_context,
        force_reanalyze: input.force_reanalyze,
    };
    let job = state.orchestrator.start_single(request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

/// POST /api/v1/analyses/batch
///
/// Start a multi-slice analysis. Returns 202 with the processing job;
/// poll `GET /analyses/{id}` for progress.
pub async fn start_batch_analysis(
    State(state): State<AppState>,
    Json(input): Json<StartBatchAnalysis>,
) -> AppResult<impl IntoResponse> {
    let request = AnalysisRequest {
        subject: Subject {
            study_id: input.study_id,
            series_id: input.series_id,
            instance_id: None,
            frame_index: 0,
            frame_count: Some(input.frame_count),
            sample_rate: input.sample_rate,
        },
        modality: input.modality,
        patient_context: input.patient_context,
        force_reanalyze: false,
    };
    let job = state.orchestrator.start_batch(request).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: job })))
}

/// GET /api/v1/analyses/{id}
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.orchestrator.get_job(&id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/analyses/{id}/cancel
///
/// Request cancellation of a running multi-slice job. Idempotent for
/// jobs that are already terminal.
pub async fn cancel_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.orchestrator.cancel_job(&id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/studies/{study_id}/analyses
pub async fn list_study_analyses(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let jobs = state.orchestrator.list_jobs_by_study(&study_id).await?;
    Ok(Json(DataResponse { data: jobs }))
}
