//! Study-level consolidation of completed single-frame jobs.
//!
//! Degradation is soft throughout: a missing id, an unfinished job, or a
//! job of the wrong shape becomes a skipped entry, never a hard error.
//! The only error case is a request in which none of the ids exist.

use std::sync::Arc;

use axon_core::consolidation::{self, FrameSummary};
use axon_core::error::CoreError;
use axon_core::job::{self, JobResult, JobStatus};
use axon_db::models::job::AnalysisJob;
use axon_db::models::report::{ConsolidatedReport, NewConsolidatedReport};
use axon_db::store::{JobStore, ReportStore};

use crate::error::OrchestratorError;

/// Builds consolidated reports from completed analysis jobs.
pub struct Consolidator {
    jobs: Arc<dyn JobStore>,
    reports: Arc<dyn ReportStore>,
}

impl Consolidator {
    pub fn new(jobs: Arc<dyn JobStore>, reports: Arc<dyn ReportStore>) -> Self {
        Self { jobs, reports }
    }

    /// Consolidate the given jobs into one persisted study report.
    ///
    /// Input order is preserved in the per-frame list, which makes the
    /// summary deterministic for a fixed input.
    pub async fn consolidate(
        &self,
        study_id: &str,
        job_ids: &[String],
    ) -> Result<ConsolidatedReport, OrchestratorError> {
        let mut frames: Vec<FrameSummary> = Vec::new();
        let mut sources: Vec<String> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();
        let mut any_found = false;

        for id in job_ids {
            match self.jobs.find(id).await? {
                None => {
                    tracing::warn!(job_id = %id, "consolidation input not found, skipping");
                    skipped.push(id.clone());
                }
                Some(row) => {
                    any_found = true;
                    match usable_frame(&row) {
                        Some(frame) => {
                            frames.push(frame);
                            sources.push(id.clone());
                        }
                        None => {
                            tracing::debug!(
                                job_id = %id,
                                status = %row.status,
                                "consolidation input not usable, skipping"
                            );
                            skipped.push(id.clone());
                        }
                    }
                }
            }
        }

        if !any_found {
            return Err(CoreError::NotFound {
                entity: "analysis jobs",
                id: job_ids.join(", "),
            }
            .into());
        }

        let summary = consolidation::summarize(&frames, job_ids.len() as u32);
        if let Some(ref warning) = summary.warning {
            tracing::warn!(study_id, warning = %warning, "consolidated report has no usable frames");
        }

        let new_report = NewConsolidatedReport {
            id: job::new_report_id(),
            study_id: study_id.to_string(),
            summary,
            per_frame: frames,
            source_job_ids: sources.clone(),
            skipped_job_ids: skipped,
        };
        let report = self.reports.insert(&new_report).await?;

        for id in &sources {
            self.jobs.link_report(id, &report.id).await?;
        }

        tracing::info!(
            report_id = %report.id,
            study_id,
            sources = sources.len(),
            "consolidated report created"
        );
        Ok(report)
    }

    pub async fn get(&self, id: &str) -> Result<ConsolidatedReport, OrchestratorError> {
        self.reports.find(id).await?.ok_or_else(|| {
            CoreError::NotFound {
                entity: "consolidated report",
                id: id.to_string(),
            }
            .into()
        })
    }

    pub async fn list_by_study(
        &self,
        study_id: &str,
    ) -> Result<Vec<ConsolidatedReport>, OrchestratorError> {
        Ok(self.reports.list_by_study(study_id).await?)
    }
}

/// A job contributes a frame only when it is a completed single-frame
/// analysis with a usable result envelope.
fn usable_frame(row: &AnalysisJob) -> Option<FrameSummary> {
    if row.status().ok()? != JobStatus::Complete {
        return None;
    }
    let envelope = match row.result()? {
        JobResult::Single(envelope) => envelope,
        JobResult::MultiSlice(_) => return None,
    };
    Some(FrameSummary {
        job_id: row.id.clone(),
        frame_index: row.frame_index as u32,
        classification: envelope.classification.clone(),
        report: envelope.report.clone(),
        backends_used: envelope.fusion.backends_used.clone(),
        analyzed_at: row.completed_at.unwrap_or(row.created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::JobLifecycle;
    use crate::testing::{
        envelope, single_result, subject, MemoryJobStore, MemoryReportStore,
    };
    use assert_matches::assert_matches;
    use axon_core::job::JobKind;

    struct Fixture {
        store: Arc<MemoryJobStore>,
        lifecycle: JobLifecycle,
        consolidator: Consolidator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryJobStore::new());
        let reports = Arc::new(MemoryReportStore::new());
        Fixture {
            store: store.clone(),
            lifecycle: JobLifecycle::new(store.clone()),
            consolidator: Consolidator::new(store, reports),
        }
    }

    async fn completed_job(f: &Fixture, frame_index: u32, label: &str, confidence: f64) -> String {
        let mut s = subject("1.2.3");
        s.frame_index = frame_index;
        let job = f
            .lifecycle
            .create(JobKind::Single, s, "CT".to_string(), None)
            .await
            .unwrap();
        f.lifecycle
            .complete(&job.id, &single_result(envelope(label, confidence)))
            .await
            .unwrap();
        job.id
    }

    #[tokio::test]
    async fn majority_label_wins() {
        let f = fixture();
        let ids = vec![
            completed_job(&f, 0, "pneumonia", 0.9).await,
            completed_job(&f, 1, "pneumonia", 0.8).await,
            completed_job(&f, 2, "normal", 0.95).await,
        ];

        let report = f.consolidator.consolidate("1.2.3", &ids).await.unwrap();
        assert!(report.id.starts_with("CR-"));
        assert_eq!(report.summary.0.most_common_label.as_deref(), Some("pneumonia"));
        assert_eq!(report.summary.0.total_processed, 3);
        assert_eq!(report.source_job_ids, ids);
        assert!(report.skipped_job_ids.is_empty());
    }

    #[tokio::test]
    async fn links_source_jobs_to_report() {
        let f = fixture();
        let id = completed_job(&f, 0, "normal", 0.9).await;
        let report = f
            .consolidator
            .consolidate("1.2.3", &[id.clone()])
            .await
            .unwrap();
        let row = f.store.get(&id).await;
        assert_eq!(row.linked_report_id.as_deref(), Some(report.id.as_str()));
    }

    #[tokio::test]
    async fn missing_id_is_skipped_softly() {
        let f = fixture();
        let good = completed_job(&f, 0, "normal", 0.9).await;
        let ids = vec![good.clone(), "AI-missing".to_string()];

        let report = f.consolidator.consolidate("1.2.3", &ids).await.unwrap();
        assert_eq!(report.source_job_ids, vec![good]);
        assert_eq!(report.skipped_job_ids, vec!["AI-missing".to_string()]);
        assert_eq!(report.summary.0.total_requested, 2);
        assert_eq!(report.summary.0.total_processed, 1);
    }

    #[tokio::test]
    async fn all_ids_missing_is_not_found() {
        let f = fixture();
        let err = f
            .consolidator
            .consolidate("1.2.3", &["AI-a".to_string(), "AI-b".to_string()])
            .await
            .unwrap_err();
        assert_matches!(
            err,
            OrchestratorError::Core(CoreError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn unfinished_job_is_skipped() {
        let f = fixture();
        let processing = f
            .lifecycle
            .create(JobKind::Single, subject("1.2.3"), "CT".to_string(), None)
            .await
            .unwrap();
        let done = completed_job(&f, 1, "normal", 0.9).await;

        let report = f
            .consolidator
            .consolidate("1.2.3", &[processing.id.clone(), done])
            .await
            .unwrap();
        assert_eq!(report.skipped_job_ids, vec![processing.id]);
    }

    #[tokio::test]
    async fn no_usable_frames_yields_warning_report() {
        let f = fixture();
        let processing = f
            .lifecycle
            .create(JobKind::Single, subject("1.2.3"), "CT".to_string(), None)
            .await
            .unwrap();

        let report = f
            .consolidator
            .consolidate("1.2.3", &[processing.id])
            .await
            .unwrap();
        assert!(report.summary.0.warning.is_some());
        assert_eq!(report.summary.0.total_processed, 0);
        assert!(report.source_job_ids.is_empty());
    }
}
