//! Store traits the orchestrator runs against, plus their Postgres
//! implementations.
//!
//! The orchestrator holds `Arc<dyn JobStore>` and `Arc<dyn ReportStore>`
//! so its tests can swap in in-memory fakes without a database.

use async_trait::async_trait;

use axon_core::job::{JobResult, Progress};

use crate::models::job::{AnalysisJob, NewAnalysisJob};
use crate::models::report::{ConsolidatedReport, NewConsolidatedReport};
use crate::repositories::analysis_job_repo::AnalysisJobRepo;
use crate::repositories::report_repo::ReportRepo;
use crate::DbPool;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of a guarded status transition.
///
/// `AlreadyTerminal` is not an error: terminal states are write-once, and
/// racing writers (batch runner vs. cancellation) both get a truthful
/// answer about whose write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The row was still processing and the transition was applied.
    Applied,
    /// The row had already reached a terminal status; nothing changed.
    AlreadyTerminal,
    /// No such job.
    NotFound,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &NewAnalysisJob) -> Result<AnalysisJob, StoreError>;

    async fn find(&self, id: &str) -> Result<Option<AnalysisJob>, StoreError>;

    /// Most recent completed single-frame job for a (study, frame) pair.
    async fn find_latest_complete(
        &self,
        study_id: &str,
        frame_index: u32,
    ) -> Result<Option<AnalysisJob>, StoreError>;

    async fn list_by_study(&self, study_id: &str) -> Result<Vec<AnalysisJob>, StoreError>;

    async fn update_progress(
        &self,
        id: &str,
        progress: &Progress,
    ) -> Result<Transition, StoreError>;

    async fn complete(&self, id: &str, result: &JobResult) -> Result<Transition, StoreError>;

    async fn fail(&self, id: &str, error: &str) -> Result<Transition, StoreError>;

    async fn cancel(
        &self,
        id: &str,
        partial: Option<&JobResult>,
    ) -> Result<Transition, StoreError>;

    async fn link_report(&self, id: &str, report_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert(
        &self,
        report: &NewConsolidatedReport,
    ) -> Result<ConsolidatedReport, StoreError>;

    async fn find(&self, id: &str) -> Result<Option<ConsolidatedReport>, StoreError>;

    async fn list_by_study(
        &self,
        study_id: &str,
    ) -> Result<Vec<ConsolidatedReport>, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres implementations
// ---------------------------------------------------------------------------

pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Classify a zero-row guarded update: the job is either terminal or
    /// missing.
    async fn classify_noop(&self, id: &str) -> Result<Transition, StoreError> {
        match AnalysisJobRepo::find(&self.pool, id).await? {
            Some(_) => Ok(Transition::AlreadyTerminal),
            None => Ok(Transition::NotFound),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &NewAnalysisJob) -> Result<AnalysisJob, StoreError> {
        Ok(AnalysisJobRepo::insert(&self.pool, job).await?)
    }

    async fn find(&self, id: &str) -> Result<Option<AnalysisJob>, StoreError> {
        Ok(AnalysisJobRepo::find(&self.pool, id).await?)
    }

    async fn find_latest_complete(
        &self,
        study_id: &str,
        frame_index: u32,
    ) -> Result<Option<AnalysisJob>, StoreError> {
        Ok(AnalysisJobRepo::find_latest_complete(&self.pool, study_id, frame_index).await?)
    }

    async fn list_by_study(&self, study_id: &str) -> Result<Vec<AnalysisJob>, StoreError> {
        Ok(AnalysisJobRepo::list_by_study(&self.pool, study_id).await?)
    }

    async fn update_progress(
        &self,
        id: &str,
        progress: &Progress,
    ) -> Result<Transition, StoreError> {
        if AnalysisJobRepo::update_progress(&self.pool, id, progress).await? > 0 {
            Ok(Transition::Applied)
        } else {
            self.classify_noop(id).await
        }
    }

    async fn complete(&self, id: &str, result: &JobResult) -> Result<Transition, StoreError> {
        if AnalysisJobRepo::complete(&self.pool, id, result).await? > 0 {
            Ok(Transition::Applied)
        } else {
            self.classify_noop(id).await
        }
    }

    async fn fail(&self, id: &str, error: &str) -> Result<Transition, StoreError> {
        if AnalysisJobRepo::fail(&self.pool, id, error).await? > 0 {
            Ok(Transition::Applied)
        } else {
            self.classify_noop(id).await
        }
    }

    async fn cancel(
        &self,
        id: &str,
        partial: Option<&JobResult>,
    ) -> Result<Transition, StoreError> {
        if AnalysisJobRepo::cancel(&self.pool, id, partial).await? > 0 {
            Ok(Transition::Applied)
        } else {
            self.classify_noop(id).await
        }
    }

    async fn link_report(&self, id: &str, report_id: &str) -> Result<(), StoreError> {
        Ok(AnalysisJobRepo::link_report(&self.pool, id, report_id).await?)
    }
}

pub struct PgReportStore {
    pool: DbPool,
}

impl PgReportStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn insert(
        &self,
        report: &NewConsolidatedReport,
    ) -> Result<ConsolidatedReport, StoreError> {
        Ok(ReportRepo::insert(&self.pool, report).await?)
    }

    async fn find(&self, id: &str) -> Result<Option<ConsolidatedReport>, StoreError> {
        Ok(ReportRepo::find(&self.pool, id).await?)
    }

    async fn list_by_study(
        &self,
        study_id: &str,
    ) -> Result<Vec<ConsolidatedReport>, StoreError> {
        Ok(ReportRepo::list_by_study(&self.pool, study_id).await?)
    }
}
