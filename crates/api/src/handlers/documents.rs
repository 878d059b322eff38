//! Text document downloads for analyses and consolidated reports.

use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;

use crate::error::AppResult;
use crate::render;
use crate::state::AppState;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// GET /api/v1/analyses/{id}/document
pub async fn analysis_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.orchestrator.get_job(&id).await?;
    let doc = render::render_job(&job)?;
    Ok((
        [
            (CONTENT_TYPE, TEXT_PLAIN.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{id}.txt\""),
            ),
        ],
        doc,
    ))
}

/// GET /api/v1/reports/{id}/document
pub async fn report_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let report = state.orchestrator.get_report(&id).await?;
    let doc = render::render_report(&report);
    Ok((
        [
            (CONTENT_TYPE, TEXT_PLAIN.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{id}.txt\""),
            ),
        ],
        doc,
    ))
}
