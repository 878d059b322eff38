//! Consolidated report row model and insert DTO.

use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

use axon_core::consolidation::{FrameSummary, ReportSummary};
use axon_core::types::Timestamp;

/// A row from the `consolidated_reports` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConsolidatedReport {
    pub id: String,
    pub study_id: String,
    pub summary: Json<ReportSummary>,
    pub per_frame: Json<Vec<FrameSummary>>,
    /// Job ids that contributed, in the caller's order.
    pub source_job_ids: Vec<String>,
    /// Requested job ids that were missing or not usable.
    pub skipped_job_ids: Vec<String>,
    pub created_at: Timestamp,
}

/// Fields for inserting a new consolidated report.
#[derive(Debug, Clone)]
pub struct NewConsolidatedReport {
    pub id: String,
    pub study_id: String,
    pub summary: ReportSummary,
    pub per_frame: Vec<FrameSummary>,
    pub source_job_ids: Vec<String>,
    pub skipped_job_ids: Vec<String>,
}
