//! In-memory collaborators for unit tests.
//!
//! The memory job store mirrors the guarded-update semantics of the
//! Postgres store: terminal transitions apply only while the row is still
//! processing, and progress snapshots are recorded so tests can assert
//! monotonicity.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::types::Json;

use axon_core::fusion::{
    self, Classification, Envelope, PatientContext, Prediction, ReportText,
};
use axon_core::job::{JobKind, JobResult, JobStatus, Progress, Subject};
use axon_db::models::job::{AnalysisJob, NewAnalysisJob};
use axon_db::models::report::{ConsolidatedReport, NewConsolidatedReport};
use axon_db::store::{JobStore, ReportStore, StoreError, Transition};
use axon_inference::{
    BackendHealth, FrameStore, HealthReport, Inference, InferenceError,
    CLASSIFIER_BACKEND, REPORT_BACKEND,
};

// ---------------------------------------------------------------------------
// Fixture helpers
// ---------------------------------------------------------------------------

pub fn subject(study_id: &str) -> Subject {
    Subject {
        study_id: study_id.to_string(),
        series_id: None,
        instance_id: None,
        frame_index: 0,
        frame_count: None,
        sample_rate: None,
    }
}

pub fn classification(label: &str, confidence: f64) -> Classification {
    Classification {
        label: label.to_string(),
        confidence,
        alternatives: vec![],
        backend: CLASSIFIER_BACKEND.to_string(),
    }
}

pub fn report_text(findings: &str) -> ReportText {
    ReportText {
        findings: findings.to_string(),
        impression: "No acute process".to_string(),
        recommendations: vec![],
        confidence: None,
        backend: REPORT_BACKEND.to_string(),
    }
}

pub fn envelope(label: &str, confidence: f64) -> Envelope {
    fusion::fuse(Some(classification(label, confidence)), None, "CT")
}

pub fn single_result(envelope: Envelope) -> JobResult {
    JobResult::Single(envelope)
}

// ---------------------------------------------------------------------------
// Memory job store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct JobState {
    rows: HashMap<String, AnalysisJob>,
    /// Insertion order, for latest-first queries.
    order: Vec<String>,
    progress: HashMap<String, Vec<Progress>>,
}

#[derive(Default)]
pub struct MemoryJobStore {
    state: Mutex<JobState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test accessor; panics when the job is missing.
    pub async fn get(&self, id: &str) -> AnalysisJob {
        let state = self.state.lock().unwrap();
        state.rows.get(id).cloned().unwrap_or_else(|| panic!("no job {id}"))
    }

    /// Applied progress snapshots, in order.
    pub async fn progress_history(&self, id: &str) -> Vec<Progress> {
        let state = self.state.lock().unwrap();
        state.progress.get(id).cloned().unwrap_or_default()
    }

    fn transition<F>(&self, id: &str, apply: F) -> Transition
    where
        F: FnOnce(&mut AnalysisJob),
    {
        let mut state = self.state.lock().unwrap();
        match state.rows.get_mut(id) {
            None => Transition::NotFound,
            Some(row) => {
                if row.status != JobStatus::Processing.as_str() {
                    Transition::AlreadyTerminal
                } else {
                    apply(row);
                    Transition::Applied
                }
            }
        }
    }
}

fn row_from_new(input: &NewAnalysisJob) -> AnalysisJob {
    AnalysisJob {
        id: input.id.clone(),
        kind: input.kind.as_str().to_string(),
        status: JobStatus::Processing.as_str().to_string(),
        study_id: input.subject.study_id.clone(),
        series_id: input.subject.series_id.clone(),
        instance_id: input.subject.instance_id.clone(),
        frame_index: input.subject.frame_index as i32,
        frame_count: input.subject.frame_count.map(|c| c as i32),
        sample_rate: input.subject.sample_rate.map(|r| r as i32),
        modality: input.modality.clone(),
        patient_context: input.patient_context.clone().map(Json),
        progress_current: 0,
        progress_total: input.progress_total as i32,
        progress_percentage: 0,
        current_step: None,
        result: None,
        error: None,
        retry_count: 0,
        linked_report_id: None,
        created_at: chrono::Utc::now(),
        completed_at: None,
        failed_at: None,
        cancelled_at: None,
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &NewAnalysisJob) -> Result<AnalysisJob, StoreError> {
        let row = row_from_new(job);
        let mut state = self.state.lock().unwrap();
        state.order.push(row.id.clone());
        state.rows.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn find(&self, id: &str) -> Result<Option<AnalysisJob>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.rows.get(id).cloned())
    }

    async fn find_latest_complete(
        &self,
        study_id: &str,
        frame_index: u32,
    ) -> Result<Option<AnalysisJob>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.rows.get(id))
            .find(|row| {
                row.study_id == study_id
                    && row.frame_index == frame_index as i32
                    && row.status == JobStatus::Complete.as_str()
                    && row.kind == JobKind::Single.as_str()
            })
            .cloned())
    }

    async fn list_by_study(&self, study_id: &str) -> Result<Vec<AnalysisJob>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.rows.get(id))
            .filter(|row| row.study_id == study_id)
            .cloned()
            .collect())
    }

    async fn update_progress(
        &self,
        id: &str,
        progress: &Progress,
    ) -> Result<Transition, StoreError> {
        let outcome = self.transition(id, |row| {
            row.progress_current = progress.current as i32;
            row.progress_total = progress.total as i32;
            row.progress_percentage = progress.percentage as i32;
            row.current_step = progress.current_step.clone();
        });
        if outcome == Transition::Applied {
            let mut state = self.state.lock().unwrap();
            state
                .progress
                .entry(id.to_string())
                .or_default()
                .push(progress.clone());
        }
        Ok(outcome)
    }

    async fn complete(&self, id: &str, result: &JobResult) -> Result<Transition, StoreError> {
        Ok(self.transition(id, |row| {
            row.status = JobStatus::Complete.as_str().to_string();
            row.result = Some(Json(result.clone()));
            row.progress_current = row.progress_total;
            row.progress_percentage = 100;
            row.completed_at = Some(chrono::Utc::now());
        }))
    }

    async fn fail(&self, id: &str, error: &str) -> Result<Transition, StoreError> {
        Ok(self.transition(id, |row| {
            row.status = JobStatus::Failed.as_str().to_string();
            row.error = Some(error.to_string());
            row.failed_at = Some(chrono::Utc::now());
        }))
    }

    async fn cancel(
        &self,
        id: &str,
        partial: Option<&JobResult>,
    ) -> Result<Transition, StoreError> {
        Ok(self.transition(id, |row| {
            row.status = JobStatus::Cancelled.as_str().to_string();
            if let Some(result) = partial {
                row.result = Some(Json(result.clone()));
            }
            row.cancelled_at = Some(chrono::Utc::now());
        }))
    }

    async fn link_report(&self, id: &str, report_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.rows.get_mut(id) {
            row.linked_report_id = Some(report_id.to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Memory report store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryReportStore {
    state: Mutex<(Vec<String>, HashMap<String, ConsolidatedReport>)>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn insert(
        &self,
        report: &NewConsolidatedReport,
    ) -> Result<ConsolidatedReport, StoreError> {
        let row = ConsolidatedReport {
            id: report.id.clone(),
            study_id: report.study_id.clone(),
            summary: Json(report.summary.clone()),
            per_frame: Json(report.per_frame.clone()),
            source_job_ids: report.source_job_ids.clone(),
            skipped_job_ids: report.skipped_job_ids.clone(),
            created_at: chrono::Utc::now(),
        };
        let mut state = self.state.lock().unwrap();
        state.0.push(row.id.clone());
        state.1.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn find(&self, id: &str) -> Result<Option<ConsolidatedReport>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.1.get(id).cloned())
    }

    async fn list_by_study(
        &self,
        study_id: &str,
    ) -> Result<Vec<ConsolidatedReport>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .0
            .iter()
            .rev()
            .filter_map(|id| state.1.get(id))
            .filter(|row| row.study_id == study_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Scripted inference
// ---------------------------------------------------------------------------

/// Mock backend pair. Queued responses are consumed first; when the queue
/// is empty the configured default applies, and with no default every
/// call fails as unreachable.
#[derive(Default)]
pub struct ScriptedInference {
    classify_queue: Mutex<VecDeque<Result<Classification, InferenceError>>>,
    report_queue: Mutex<VecDeque<Result<ReportText, InferenceError>>>,
    default_classification: Mutex<Option<Classification>>,
    default_report: Mutex<Option<ReportText>>,
}

impl ScriptedInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_classification(&self, label: &str, confidence: f64) {
        self.classify_queue
            .lock()
            .unwrap()
            .push_back(Ok(classification(label, confidence)));
    }

    pub fn push_classification_with_alternatives(
        &self,
        label: &str,
        confidence: f64,
        alternatives: Vec<Prediction>,
    ) {
        let mut c = classification(label, confidence);
        c.alternatives = alternatives;
        self.classify_queue.lock().unwrap().push_back(Ok(c));
    }

    pub fn push_classify_timeout(&self) {
        self.classify_queue
            .lock()
            .unwrap()
            .push_back(Err(InferenceError::Timeout("classify deadline".to_string())));
    }

    pub fn push_report(&self, findings: &str) {
        self.report_queue
            .lock()
            .unwrap()
            .push_back(Ok(report_text(findings)));
    }

    pub fn push_report_unreachable(&self) {
        self.report_queue
            .lock()
            .unwrap()
            .push_back(Err(InferenceError::Unreachable(
                "connection refused".to_string(),
            )));
    }

    pub fn set_default_classification(&self, label: &str, confidence: f64) {
        *self.default_classification.lock().unwrap() = Some(classification(label, confidence));
    }

    pub fn set_default_report(&self, findings: &str) {
        *self.default_report.lock().unwrap() = Some(report_text(findings));
    }
}

#[async_trait]
impl Inference for ScriptedInference {
    async fn classify(
        &self,
        _image: &[u8],
        _modality: &str,
    ) -> Result<Classification, InferenceError> {
        if let Some(scripted) = self.classify_queue.lock().unwrap().pop_front() {
            return scripted;
        }
        match self.default_classification.lock().unwrap().clone() {
            Some(c) => Ok(c),
            None => Err(InferenceError::Unreachable("no scripted response".to_string())),
        }
    }

    async fn generate_report(
        &self,
        _image: &[u8],
        _modality: &str,
        _label_hint: Option<&str>,
        _patient: Option<&PatientContext>,
    ) -> Result<ReportText, InferenceError> {
        if let Some(scripted) = self.report_queue.lock().unwrap().pop_front() {
            return scripted;
        }
        match self.default_report.lock().unwrap().clone() {
            Some(r) => Ok(r),
            None => Err(InferenceError::Unreachable("no scripted response".to_string())),
        }
    }

    async fn health(&self) -> HealthReport {
        HealthReport {
            classifier: BackendHealth {
                name: CLASSIFIER_BACKEND.to_string(),
                healthy: true,
                latency_ms: 0,
                detail: None,
            },
            report_generator: BackendHealth {
                name: REPORT_BACKEND.to_string(),
                healthy: true,
                latency_ms: 0,
                detail: None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Memory frame store
// ---------------------------------------------------------------------------

/// Frame source backed by a frame count; individual frames can be removed
/// to simulate archive gaps.
#[derive(Default)]
pub struct MemoryFrameStore {
    frame_count: u32,
    missing: Mutex<HashSet<u32>>,
}

impl MemoryFrameStore {
    pub fn with_frames(frame_count: u32) -> Self {
        Self {
            frame_count,
            missing: Mutex::new(HashSet::new()),
        }
    }

    pub fn remove_frame(&self, frame_index: u32) {
        self.missing.lock().unwrap().insert(frame_index);
    }
}

#[async_trait]
impl FrameStore for MemoryFrameStore {
    async fn get_frame(
        &self,
        _study_id: &str,
        frame_index: u32,
    ) -> Result<Option<Vec<u8>>, InferenceError> {
        if frame_index >= self.frame_count || self.missing.lock().unwrap().contains(&frame_index) {
            return Ok(None);
        }
        Ok(Some(vec![0u8; 8]))
    }
}
