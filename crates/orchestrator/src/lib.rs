//! Analysis orchestration: job lifecycle, dual-model coordination, batch
//! execution, and study-level consolidation.
//!
//! The [`Orchestrator`] facade owns every collaborator behind a trait
//! object, wired in by the caller at startup. Handlers hold an
//! `Arc<Orchestrator>` and call the operations below; nothing in this
//! crate talks to HTTP or SQL directly.

pub mod active;
pub mod batch;
pub mod consolidate;
pub mod coordinator;
pub mod error;
pub mod lifecycle;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use axon_core::error::CoreError;
use axon_core::fusion::PatientContext;
use axon_core::job::{JobKind, JobResult, Subject};
use axon_db::models::job::AnalysisJob;
use axon_db::models::report::ConsolidatedReport;
use axon_db::store::{JobStore, ReportStore};
use axon_inference::{FrameStore, HealthReport, Inference};

pub use active::ActiveJobs;
pub use batch::{BatchMode, BatchRunner};
pub use consolidate::Consolidator;
pub use coordinator::Coordinator;
pub use error::OrchestratorError;
pub use lifecycle::JobLifecycle;

/// Orchestrator-level settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorConfig {
    /// Per-frame analysis depth for batch jobs.
    pub batch_mode: BatchMode,
}

/// A request to analyze one frame or a whole series.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub subject: Subject,
    pub modality: String,
    pub patient_context: Option<PatientContext>,
    /// Bypass the completed-analysis cache for single analyses.
    pub force_reanalyze: bool,
}

/// Facade over the analysis pipeline.
pub struct Orchestrator {
    lifecycle: Arc<JobLifecycle>,
    coordinator: Coordinator,
    runner: BatchRunner,
    consolidator: Consolidator,
    frames: Arc<dyn FrameStore>,
    inference: Arc<dyn Inference>,
    active: ActiveJobs,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        reports: Arc<dyn ReportStore>,
        inference: Arc<dyn Inference>,
        frames: Arc<dyn FrameStore>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        let lifecycle = Arc::new(JobLifecycle::new(jobs.clone()));
        Arc::new(Self {
            coordinator: Coordinator::new(inference.clone()),
            runner: BatchRunner::new(lifecycle.clone(), inference.clone(), frames.clone()),
            consolidator: Consolidator::new(jobs, reports),
            lifecycle,
            frames,
            inference,
            active: ActiveJobs::new(),
            config,
        })
    }

    // -- Single analysis ----------------------------------------------------

    /// Analyze one frame synchronously. Returns the terminal job row, or
    /// a cached completed job for the same (study, frame) unless the
    /// caller forces reanalysis.
    pub async fn start_single(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisJob, OrchestratorError> {
        if !request.force_reanalyze {
            if let Some(cached) = self
                .lifecycle
                .find_cached(&request.subject.study_id, request.subject.frame_index)
                .await?
            {
                tracing::info!(
                    job_id = %cached.id,
                    study_id = %request.subject.study_id,
                    frame_index = request.subject.frame_index,
                    "returning cached analysis"
                );
                return Ok(cached);
            }
        }

        let job = self
            .lifecycle
            .create(
                JobKind::Single,
                request.subject.clone(),
                request.modality.clone(),
                request.patient_context.clone(),
            )
            .await?;

        let image = match self
            .frames
            .get_frame(&request.subject.study_id, request.subject.frame_index)
            .await
        {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.lifecycle
                    .fail(&job.id, "Frame not found in archive")
                    .await?;
                return self.lifecycle.get(&job.id).await;
            }
            Err(err) => {
                self.lifecycle
                    .fail(&job.id, &format!("Frame fetch failed: {err}"))
                    .await?;
                return self.lifecycle.get(&job.id).await;
            }
        };

        match self
            .coordinator
            .analyze_frame(&image, &request.modality, request.patient_context.as_ref())
            .await
        {
            Ok(envelope) => {
                self.lifecycle
                    .complete(&job.id, &JobResult::Single(envelope))
                    .await?;
            }
            Err(err) => {
                self.lifecycle.fail(&job.id, &err.to_string()).await?;
            }
        }
        self.lifecycle.get(&job.id).await
    }

    // -- Batch analysis -----------------------------------------------------

    /// Start a multi-slice analysis. Returns the processing job row
    /// immediately; a background task drives it to a terminal status.
    pub async fn start_batch(
        self: &Arc<Self>,
        request: AnalysisRequest,
    ) -> Result<AnalysisJob, OrchestratorError> {
        let job = self
            .lifecycle
            .create(
                JobKind::MultiSlice,
                request.subject,
                request.modality,
                request.patient_context,
            )
            .await?;

        let token = self.active.register(&job.id).await;
        let orchestrator = Arc::clone(self);
        let row = job.clone();
        let mode = self.config.batch_mode;
        tokio::spawn(async move {
            if let Err(err) = orchestrator.runner.run(&row, mode, token).await {
                tracing::error!(job_id = %row.id, error = %err, "batch task aborted");
            }
            orchestrator.active.remove(&row.id).await;
        });

        Ok(job)
    }

    // -- Queries ------------------------------------------------------------

    pub async fn get_job(&self, id: &str) -> Result<AnalysisJob, OrchestratorError> {
        self.lifecycle.get(id).await
    }

    pub async fn list_jobs_by_study(
        &self,
        study_id: &str,
    ) -> Result<Vec<AnalysisJob>, OrchestratorError> {
        self.lifecycle.list_by_study(study_id).await
    }

    // -- Cancellation -------------------------------------------------------

    /// Cancel a running multi-slice job. Idempotent: cancelling a job
    /// that is already terminal returns it unchanged.
    pub async fn cancel_job(&self, id: &str) -> Result<AnalysisJob, OrchestratorError> {
        let job = self.lifecycle.get(id).await?;
        if job.status()?.is_terminal() {
            return Ok(job);
        }
        if job.kind()? == JobKind::Single {
            return Err(CoreError::Conflict(
                "Single-frame analyses complete synchronously and cannot be cancelled"
                    .to_string(),
            )
            .into());
        }

        if !self.active.cancel(id).await {
            // No live task for this job (e.g. after a restart). Finalize
            // the row directly.
            self.lifecycle.cancel(id, None).await?;
        }
        self.lifecycle.get(id).await
    }

    // -- Consolidation ------------------------------------------------------

    pub async fn consolidate(
        &self,
        study_id: &str,
        job_ids: &[String],
    ) -> Result<ConsolidatedReport, OrchestratorError> {
        self.consolidator.consolidate(study_id, job_ids).await
    }

    pub async fn get_report(&self, id: &str) -> Result<ConsolidatedReport, OrchestratorError> {
        self.consolidator.get(id).await
    }

    pub async fn list_reports_by_study(
        &self,
        study_id: &str,
    ) -> Result<Vec<ConsolidatedReport>, OrchestratorError> {
        self.consolidator.list_by_study(study_id).await
    }

    // -- Health and shutdown ------------------------------------------------

    /// Probe both inference backends.
    pub async fn backend_health(&self) -> HealthReport {
        self.inference.health().await
    }

    /// Number of batch jobs currently running.
    pub async fn active_job_count(&self) -> usize {
        self.active.count().await
    }

    /// Cancel every running batch job. Called during graceful shutdown;
    /// each job finalizes itself as cancelled with its partial results.
    pub fn shutdown(&self) {
        self.active.shutdown();
    }
}
