//! Analysis job row model and insert DTO.

use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

use axon_core::error::CoreError;
use axon_core::fusion::PatientContext;
use axon_core::job::{JobKind, JobResult, JobStatus, Progress, Subject};
use axon_core::types::Timestamp;

/// A row from the `analysis_jobs` table.
///
/// `kind` and `status` are stored as their stable string forms; use the
/// typed accessors rather than comparing strings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnalysisJob {
    pub id: String,
    pub kind: String,
    pub status: String,

    pub study_id: String,
    pub series_id: Option<String>,
    pub instance_id: Option<String>,
    pub frame_index: i32,
    pub frame_count: Option<i32>,
    pub sample_rate: Option<i32>,
    pub modality: String,
    pub patient_context: Option<Json<PatientContext>>,

    pub progress_current: i32,
    pub progress_total: i32,
    pub progress_percentage: i32,
    pub current_step: Option<String>,

    pub result: Option<Json<JobResult>>,
    pub error: Option<String>,
    pub retry_count: i32,
    pub linked_report_id: Option<String>,

    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub failed_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
}

impl AnalysisJob {
    pub fn kind(&self) -> Result<JobKind, CoreError> {
        JobKind::parse(&self.kind)
    }

    pub fn status(&self) -> Result<JobStatus, CoreError> {
        JobStatus::parse(&self.status)
    }

    /// The immutable (study, series, instance, frame) reference.
    pub fn subject(&self) -> Subject {
        Subject {
            study_id: self.study_id.clone(),
            series_id: self.series_id.clone(),
            instance_id: self.instance_id.clone(),
            frame_index: self.frame_index as u32,
            frame_count: self.frame_count.map(|c| c as u32),
            sample_rate: self.sample_rate.map(|r| r as u32),
        }
    }

    pub fn progress(&self) -> Progress {
        Progress {
            current: self.progress_current as u32,
            total: self.progress_total as u32,
            percentage: self.progress_percentage as u32,
            current_step: self.current_step.clone(),
        }
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref().map(|json| &json.0)
    }
}

/// Fields for inserting a new job. The row starts in `processing`.
#[derive(Debug, Clone)]
pub struct NewAnalysisJob {
    pub id: String,
    pub kind: JobKind,
    pub subject: Subject,
    pub modality: String,
    pub patient_context: Option<PatientContext>,
    /// Planned number of progress steps (1 for single jobs).
    pub progress_total: u32,
}
