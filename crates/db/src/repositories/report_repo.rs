//! Repository for the `consolidated_reports` table.

use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::report::{ConsolidatedReport, NewConsolidatedReport};

/// Column list for `consolidated_reports` queries.
const COLUMNS: &str = "\
    id, study_id, summary, per_frame, source_job_ids, skipped_job_ids, created_at";

pub struct ReportRepo;

impl ReportRepo {
    pub async fn insert(
        pool: &PgPool,
        input: &NewConsolidatedReport,
    ) -> Result<ConsolidatedReport, sqlx::Error> {
        let query = format!(
            "INSERT INTO consolidated_reports \
             (id, study_id, summary, per_frame, source_job_ids, skipped_job_ids) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ConsolidatedReport>(&query)
            .bind(&input.id)
            .bind(&input.study_id)
            .bind(Json(&input.summary))
            .bind(Json(&input.per_frame))
            .bind(&input.source_job_ids)
            .bind(&input.skipped_job_ids)
            .fetch_one(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        id: &str,
    ) -> Result<Option<ConsolidatedReport>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM consolidated_reports WHERE id = $1");
        sqlx::query_as::<_, ConsolidatedReport>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All consolidated reports for a study, newest first.
    pub async fn list_by_study(
        pool: &PgPool,
        study_id: &str,
    ) -> Result<Vec<ConsolidatedReport>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM consolidated_reports \
             WHERE study_id = $1 \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, ConsolidatedReport>(&query)
            .bind(study_id)
            .fetch_all(pool)
            .await
    }
}
