//! Job lifecycle: creation, cache lookup, and idempotent status
//! transitions.
//!
//! Terminal transitions go through the store's guarded updates, so a job
//! that is already terminal is never overwritten. The first writer wins;
//! later writers get [`Transition::AlreadyTerminal`] and treat it as a
//! no-op.

use std::sync::Arc;

use axon_core::error::CoreError;
use axon_core::fusion::PatientContext;
use axon_core::job::{
    self, JobKind, JobResult, JobStatus, Progress, Subject,
};
use axon_db::models::job::{AnalysisJob, NewAnalysisJob};
use axon_db::store::{JobStore, Transition};

use crate::error::OrchestratorError;

/// Creates jobs and applies status transitions through the job store.
pub struct JobLifecycle {
    store: Arc<dyn JobStore>,
}

impl JobLifecycle {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Validate the subject and persist a new job in `processing`.
    pub async fn create(
        &self,
        kind: JobKind,
        subject: Subject,
        modality: String,
        patient_context: Option<PatientContext>,
    ) -> Result<AnalysisJob, OrchestratorError> {
        job::validate_subject(kind, &subject)?;

        let progress_total = match kind {
            JobKind::Single => 1,
            JobKind::MultiSlice => {
                // Validation guarantees frame_count is present and positive.
                let count = subject.frame_count.unwrap_or(1);
                job::planned_frames(count, subject.effective_sample_rate())
            }
        };

        let new_job = NewAnalysisJob {
            id: job::new_analysis_id(),
            kind,
            subject,
            modality,
            patient_context,
            progress_total,
        };

        let row = self.store.insert(&new_job).await?;
        tracing::info!(
            job_id = %row.id,
            kind = %row.kind,
            study_id = %row.study_id,
            "analysis job created"
        );
        Ok(row)
    }

    /// Fetch a job or fail with `NotFound`.
    pub async fn get(&self, id: &str) -> Result<AnalysisJob, OrchestratorError> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "analysis job",
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// Latest completed single-frame job for this (study, frame) pair, if
    /// any. Used to short-circuit repeat single analyses.
    pub async fn find_cached(
        &self,
        study_id: &str,
        frame_index: u32,
    ) -> Result<Option<AnalysisJob>, OrchestratorError> {
        Ok(self.store.find_latest_complete(study_id, frame_index).await?)
    }

    pub async fn list_by_study(
        &self,
        study_id: &str,
    ) -> Result<Vec<AnalysisJob>, OrchestratorError> {
        Ok(self.store.list_by_study(study_id).await?)
    }

    /// Persist a progress snapshot. Silently dropped once the job is
    /// terminal; that race is expected during cancellation.
    pub async fn update_progress(
        &self,
        id: &str,
        progress: &Progress,
    ) -> Result<(), OrchestratorError> {
        match self.store.update_progress(id, progress).await? {
            Transition::Applied => Ok(()),
            Transition::AlreadyTerminal => {
                tracing::debug!(
                    job_id = id,
                    current = progress.current,
                    "progress update dropped, job already terminal"
                );
                Ok(())
            }
            Transition::NotFound => Err(CoreError::NotFound {
                entity: "analysis job",
                id: id.to_string(),
            }
            .into()),
        }
    }

    /// Transition to `complete` with the result payload.
    pub async fn complete(
        &self,
        id: &str,
        result: &JobResult,
    ) -> Result<Transition, OrchestratorError> {
        let outcome = self.store.complete(id, result).await?;
        self.log_transition(id, JobStatus::Complete, outcome);
        Ok(outcome)
    }

    /// Transition to `failed` with an error message.
    pub async fn fail(&self, id: &str, error: &str) -> Result<Transition, OrchestratorError> {
        let outcome = self.store.fail(id, error).await?;
        self.log_transition(id, JobStatus::Failed, outcome);
        Ok(outcome)
    }

    /// Transition to `cancelled`, preserving any partial result.
    pub async fn cancel(
        &self,
        id: &str,
        partial: Option<&JobResult>,
    ) -> Result<Transition, OrchestratorError> {
        let outcome = self.store.cancel(id, partial).await?;
        self.log_transition(id, JobStatus::Cancelled, outcome);
        Ok(outcome)
    }

    pub async fn link_report(
        &self,
        id: &str,
        report_id: &str,
    ) -> Result<(), OrchestratorError> {
        Ok(self.store.link_report(id, report_id).await?)
    }

    fn log_transition(&self, id: &str, target: JobStatus, outcome: Transition) {
        match outcome {
            Transition::Applied => {
                tracing::info!(job_id = id, status = target.as_str(), "job transitioned");
            }
            Transition::AlreadyTerminal => {
                tracing::debug!(
                    job_id = id,
                    attempted = target.as_str(),
                    "transition dropped, job already terminal"
                );
            }
            Transition::NotFound => {
                tracing::warn!(job_id = id, "transition target job not found");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{envelope, single_result, subject, MemoryJobStore};
    use assert_matches::assert_matches;
    use axon_core::job::JobStatus;

    fn lifecycle() -> (Arc<MemoryJobStore>, JobLifecycle) {
        let store = Arc::new(MemoryJobStore::new());
        let lifecycle = JobLifecycle::new(store.clone());
        (store, lifecycle)
    }

    #[tokio::test]
    async fn create_starts_processing() {
        let (_, lifecycle) = lifecycle();
        let job = lifecycle
            .create(JobKind::Single, subject("1.2.3"), "CR".to_string(), None)
            .await
            .unwrap();
        assert!(job.id.starts_with("AI-"));
        assert_eq!(job.status().unwrap(), JobStatus::Processing);
        assert_eq!(job.progress_total, 1);
    }

    #[tokio::test]
    async fn create_rejects_invalid_subject() {
        let (_, lifecycle) = lifecycle();
        let err = lifecycle
            .create(JobKind::MultiSlice, subject("1.2.3"), "CT".to_string(), None)
            .await
            .unwrap_err();
        assert_matches!(err, OrchestratorError::Core(CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn multi_slice_progress_total_uses_sample_rate() {
        let (_, lifecycle) = lifecycle();
        let mut s = subject("1.2.3");
        s.frame_count = Some(10);
        s.sample_rate = Some(3);
        let job = lifecycle
            .create(JobKind::MultiSlice, s, "CT".to_string(), None)
            .await
            .unwrap();
        assert_eq!(job.progress_total, 4);
    }

    #[tokio::test]
    async fn terminal_status_is_write_once() {
        let (store, lifecycle) = lifecycle();
        let job = lifecycle
            .create(JobKind::Single, subject("1.2.3"), "CR".to_string(), None)
            .await
            .unwrap();

        let result = single_result(envelope("pneumonia", 0.9));
        assert_eq!(
            lifecycle.complete(&job.id, &result).await.unwrap(),
            Transition::Applied
        );
        // A later failure attempt must not overwrite the completion.
        assert_eq!(
            lifecycle.fail(&job.id, "late failure").await.unwrap(),
            Transition::AlreadyTerminal
        );

        let row = store.get(&job.id).await;
        assert_eq!(row.status().unwrap(), JobStatus::Complete);
        assert!(row.error.is_none());
    }

    #[tokio::test]
    async fn progress_after_terminal_is_dropped() {
        let (store, lifecycle) = lifecycle();
        let mut s = subject("1.2.3");
        s.frame_count = Some(4);
        let job = lifecycle
            .create(JobKind::MultiSlice, s, "CT".to_string(), None)
            .await
            .unwrap();

        lifecycle.cancel(&job.id, None).await.unwrap();
        let progress = Progress {
            current: 3,
            total: 4,
            percentage: 75,
            current_step: None,
        };
        // No error, but the snapshot must not land.
        lifecycle.update_progress(&job.id, &progress).await.unwrap();

        let row = store.get(&job.id).await;
        assert_eq!(row.status().unwrap(), JobStatus::Cancelled);
        assert_eq!(row.progress_current, 0);
    }

    #[tokio::test]
    async fn get_missing_job_is_not_found() {
        let (_, lifecycle) = lifecycle();
        let err = lifecycle.get("AI-missing").await.unwrap_err();
        assert_matches!(err, OrchestratorError::Core(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn cached_lookup_sees_only_complete_jobs() {
        let (_, lifecycle) = lifecycle();
        let job = lifecycle
            .create(JobKind::Single, subject("1.2.3"), "CR".to_string(), None)
            .await
            .unwrap();
        assert!(lifecycle.find_cached("1.2.3", 0).await.unwrap().is_none());

        lifecycle
            .complete(&job.id, &single_result(envelope("normal", 0.8)))
            .await
            .unwrap();
        let cached = lifecycle.find_cached("1.2.3", 0).await.unwrap().unwrap();
        assert_eq!(cached.id, job.id);
    }
}
