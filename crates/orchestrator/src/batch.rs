//! Sequential multi-slice batch runner.
//!
//! One background task per batch job walks the series at the configured
//! sample rate, analyzes each visited frame, persists progress after every
//! frame, and checks its cancellation token at the top of each iteration.
//! A frame whose fetch or analysis fails is recorded as skipped and the
//! loop continues; the job only fails when no frame at all was analyzed.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use axon_core::fusion::PatientContext;
use axon_core::job::{self, FrameAnalysis, JobResult, MultiSliceResult};
use axon_db::models::job::AnalysisJob;
use axon_inference::{FrameStore, Inference};

use crate::coordinator::Coordinator;
use crate::error::OrchestratorError;
use crate::lifecycle::JobLifecycle;

/// Per-frame analysis depth for batch jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Classifier only. The cheap path for long series; a consolidated
    /// report can still be produced from the classifications.
    #[default]
    ClassifyOnly,
    /// Both backends per frame.
    Full,
}

/// Runs one multi-slice job to a terminal status.
pub struct BatchRunner {
    lifecycle: Arc<JobLifecycle>,
    inference: Arc<dyn Inference>,
    frames: Arc<dyn FrameStore>,
    coordinator: Coordinator,
}

impl BatchRunner {
    pub fn new(
        lifecycle: Arc<JobLifecycle>,
        inference: Arc<dyn Inference>,
        frames: Arc<dyn FrameStore>,
    ) -> Self {
        let coordinator = Coordinator::new(inference.clone());
        Self {
            lifecycle,
            inference,
            frames,
            coordinator,
        }
    }

    /// Drive the job to Complete, Failed, or Cancelled.
    ///
    /// Always leaves the job terminal unless the store itself errors.
    pub async fn run(
        &self,
        job: &AnalysisJob,
        mode: BatchMode,
        cancel: CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let subject = job.subject();
        let frame_count = subject.frame_count.unwrap_or(1);
        let rate = subject.effective_sample_rate();
        let patient = job.patient_context.as_ref().map(|json| json.0.clone());

        tracing::info!(
            job_id = %job.id,
            frame_count,
            sample_rate = rate,
            mode = ?mode,
            "batch analysis started"
        );

        let mut analyzed: Vec<FrameAnalysis> = Vec::new();
        let mut skipped: Vec<u32> = Vec::new();

        let mut index = 0u32;
        while index < frame_count {
            if cancel.is_cancelled() {
                let partial =
                    JobResult::MultiSlice(MultiSliceResult::from_frames(analyzed, skipped));
                self.lifecycle.cancel(&job.id, Some(&partial)).await?;
                tracing::info!(job_id = %job.id, frame_index = index, "batch cancelled");
                return Ok(());
            }

            match self
                .analyze_one(&subject.study_id, index, &job.modality, patient.as_ref(), mode)
                .await
            {
                Some(frame) => analyzed.push(frame),
                None => skipped.push(index),
            }

            let progress = job::progress_for_frame(index, rate, frame_count);
            self.lifecycle.update_progress(&job.id, &progress).await?;

            index += rate;
        }

        if analyzed.is_empty() {
            self.lifecycle
                .fail(&job.id, "All frames failed analysis")
                .await?;
        } else {
            let result = JobResult::MultiSlice(MultiSliceResult::from_frames(analyzed, skipped));
            self.lifecycle.complete(&job.id, &result).await?;
        }
        Ok(())
    }

    /// Fetch and analyze one frame. `None` means the frame is skipped.
    async fn analyze_one(
        &self,
        study_id: &str,
        frame_index: u32,
        modality: &str,
        patient: Option<&PatientContext>,
        mode: BatchMode,
    ) -> Option<FrameAnalysis> {
        let image = match self.frames.get_frame(study_id, frame_index).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::warn!(study_id, frame_index, "frame missing, skipping");
                return None;
            }
            Err(err) => {
                tracing::warn!(study_id, frame_index, error = %err, "frame fetch failed, skipping");
                return None;
            }
        };

        match mode {
            BatchMode::ClassifyOnly => match self.inference.classify(&image, modality).await {
                Ok(classification) => Some(FrameAnalysis {
                    frame_index,
                    backends_used: vec![classification.backend.clone()],
                    classification: Some(classification),
                    report: None,
                }),
                Err(err) => {
                    tracing::warn!(frame_index, error = %err, "classification failed, skipping");
                    None
                }
            },
            BatchMode::Full => match self
                .coordinator
                .analyze_frame(&image, modality, patient)
                .await
            {
                Ok(envelope) => Some(FrameAnalysis {
                    frame_index,
                    classification: envelope.classification,
                    report: envelope.report,
                    backends_used: envelope.fusion.backends_used,
                }),
                Err(err) => {
                    tracing::warn!(frame_index, error = %err, "frame analysis failed, skipping");
                    None
                }
            },
        }
    }
}
