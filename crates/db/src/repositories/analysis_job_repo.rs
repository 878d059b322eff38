//! Repository for the `analysis_jobs` table.
//!
//! Terminal transitions are guarded single-row updates: the `SET` only
//! applies while the row is still `processing`, so a job that has reached
//! a terminal status is never overwritten. Callers inspect the affected
//! row count to tell an applied transition from a no-op.

use sqlx::types::Json;
use sqlx::PgPool;

use axon_core::job::{JobResult, JobStatus, Progress};

use crate::models::job::{AnalysisJob, NewAnalysisJob};

/// Column list for `analysis_jobs` queries.
const COLUMNS: &str = "\
    id, kind, status, \
    study_id, series_id, instance_id, frame_index, frame_count, sample_rate, \
    modality, patient_context, \
    progress_current, progress_total, progress_percentage, current_step, \
    result, error, retry_count, linked_report_id, \
    created_at, completed_at, failed_at, cancelled_at";

/// CRUD and guarded status transitions for analysis jobs.
pub struct AnalysisJobRepo;

impl AnalysisJobRepo {
    /// Insert a new job in `processing`.
    pub async fn insert(pool: &PgPool, input: &NewAnalysisJob) -> Result<AnalysisJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO analysis_jobs \
             (id, kind, study_id, series_id, instance_id, frame_index, frame_count, \
              sample_rate, modality, patient_context, progress_total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalysisJob>(&query)
            .bind(&input.id)
            .bind(input.kind.as_str())
            .bind(&input.subject.study_id)
            .bind(&input.subject.series_id)
            .bind(&input.subject.instance_id)
            .bind(input.subject.frame_index as i32)
            .bind(input.subject.frame_count.map(|c| c as i32))
            .bind(input.subject.sample_rate.map(|r| r as i32))
            .bind(&input.modality)
            .bind(input.patient_context.as_ref().map(Json))
            .bind(input.progress_total as i32)
            .fetch_one(pool)
            .await
    }

    pub async fn find(pool: &PgPool, id: &str) -> Result<Option<AnalysisJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM analysis_jobs WHERE id = $1");
        sqlx::query_as::<_, AnalysisJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent completed single-frame job for a (study, frame) pair.
    /// Cache lookups go through here.
    pub async fn find_latest_complete(
        pool: &PgPool,
        study_id: &str,
        frame_index: u32,
    ) -> Result<Option<AnalysisJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM analysis_jobs \
             WHERE study_id = $1 AND frame_index = $2 AND status = $3 AND kind = 'single' \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, AnalysisJob>(&query)
            .bind(study_id)
            .bind(frame_index as i32)
            .bind(JobStatus::Complete.as_str())
            .fetch_optional(pool)
            .await
    }

    /// All jobs for a study, newest first.
    pub async fn list_by_study(
        pool: &PgPool,
        study_id: &str,
    ) -> Result<Vec<AnalysisJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM analysis_jobs \
             WHERE study_id = $1 \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, AnalysisJob>(&query)
            .bind(study_id)
            .fetch_all(pool)
            .await
    }

    /// Update progress while the job is still processing. Returns the
    /// number of rows changed (0 when the job is terminal or missing).
    pub async fn update_progress(
        pool: &PgPool,
        id: &str,
        progress: &Progress,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE analysis_jobs \
             SET progress_current = $2, progress_total = $3, \
                 progress_percentage = $4, current_step = $5 \
             WHERE id = $1 AND status = $6",
        )
        .bind(id)
        .bind(progress.current as i32)
        .bind(progress.total as i32)
        .bind(progress.percentage as i32)
        .bind(&progress.current_step)
        .bind(JobStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Transition to `complete` with the result payload.
    pub async fn complete(
        pool: &PgPool,
        id: &str,
        result: &JobResult,
    ) -> Result<u64, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE analysis_jobs \
             SET status = $2, result = $3, completed_at = NOW(), \
                 progress_current = progress_total, progress_percentage = 100 \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(JobStatus::Complete.as_str())
        .bind(Json(result))
        .bind(JobStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected())
    }

    /// Transition to `failed` with an error message.
    pub async fn fail(pool: &PgPool, id: &str, error: &str) -> Result<u64, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE analysis_jobs \
             SET status = $2, error = $3, failed_at = NOW() \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .bind(JobStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected())
    }

    /// Transition to `cancelled`, keeping any partial result the batch
    /// runner accumulated before the token fired.
    pub async fn cancel(
        pool: &PgPool,
        id: &str,
        partial: Option<&JobResult>,
    ) -> Result<u64, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE analysis_jobs \
             SET status = $2, result = COALESCE($3, result), cancelled_at = NOW() \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(JobStatus::Cancelled.as_str())
        .bind(partial.map(Json))
        .bind(JobStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected())
    }

    /// Point a completed job at the consolidated report it fed into.
    pub async fn link_report(
        pool: &PgPool,
        id: &str,
        report_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE analysis_jobs SET linked_report_id = $2 WHERE id = $1")
            .bind(id)
            .bind(report_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
