//! Analysis job domain types: kind, status, subject, progress, and the
//! typed result payload.
//!
//! Everything here is pure. Status transitions themselves are enforced by
//! the job store (guarded single-record updates); this module defines the
//! vocabulary and the arithmetic the orchestrator relies on.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::fusion::{Classification, Envelope, ReportText};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Length of the random id suffix.
const ID_SUFFIX_LEN: usize = 6;

/// Uppercase alphanumeric alphabet for id suffixes.
const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn id_suffix() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Generate a new analysis job id, e.g. `AI-2026-08-25-X7K2P9`.
///
/// Date-prefixed for operator readability, random suffix so ids are not
/// guessable or sequential. Format-stable: callers may rely on the `AI-`
/// prefix.
pub fn new_analysis_id() -> String {
    format!("AI-{}-{}", chrono::Utc::now().format("%Y-%m-%d"), id_suffix())
}

/// Generate a new consolidated report id, e.g. `CR-2026-08-25-M4Q8Z1`.
pub fn new_report_id() -> String {
    format!("CR-{}-{}", chrono::Utc::now().format("%Y-%m-%d"), id_suffix())
}

// ---------------------------------------------------------------------------
// Kind and status
// ---------------------------------------------------------------------------

/// The two job shapes this system supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// One frame, analyzed synchronously with both backends.
    Single,
    /// Many frames, analyzed sequentially in a background task.
    MultiSlice,
}

impl JobKind {
    /// Stable string form used in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::MultiSlice => "multi_slice",
        }
    }

    /// Parse the database string form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "single" => Ok(Self::Single),
            "multi_slice" => Ok(Self::MultiSlice),
            other => Err(CoreError::Internal(format!("Unknown job kind: '{other}'"))),
        }
    }
}

/// Lifecycle state of an analysis job.
///
/// `Processing` is the only non-terminal state; a job is processing from
/// the instant it is persisted. All three terminal states are final; a
/// job is write-once after reaching any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Complete,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Stable string form used in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the database string form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "processing" => Ok(Self::Processing),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::Internal(format!("Unknown job status: '{other}'"))),
        }
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

// ---------------------------------------------------------------------------
// Subject
// ---------------------------------------------------------------------------

/// The (study, series, instance, frame) reference a job analyzes.
///
/// Immutable once the job is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub study_id: String,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Frame index for single jobs; starting frame (always 0) for batches.
    #[serde(default)]
    pub frame_index: u32,
    /// Total frames in the series. Required for `MultiSlice`.
    #[serde(default)]
    pub frame_count: Option<u32>,
    /// Analyze every Nth frame. Defaults to 1 (every frame).
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

impl Subject {
    /// Sample rate with the default applied.
    pub fn effective_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(1).max(1)
    }
}

/// Validate that a subject carries the fields its job kind requires.
pub fn validate_subject(kind: JobKind, subject: &Subject) -> Result<(), CoreError> {
    if subject.study_id.is_empty() {
        return Err(CoreError::Validation("study_id must not be empty".to_string()));
    }
    if kind == JobKind::MultiSlice {
        match subject.frame_count {
            None => {
                return Err(CoreError::Validation(
                    "frame_count is required for multi-slice analysis".to_string(),
                ))
            }
            Some(0) => {
                return Err(CoreError::Validation(
                    "frame_count must be positive".to_string(),
                ))
            }
            Some(_) => {}
        }
        if subject.sample_rate == Some(0) {
            return Err(CoreError::Validation(
                "sample_rate must be positive".to_string(),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress snapshot for a multi-slice job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
    pub percentage: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
}

/// Number of frames a batch will visit: `ceil(frame_count / sample_rate)`.
pub fn planned_frames(frame_count: u32, sample_rate: u32) -> u32 {
    frame_count.div_ceil(sample_rate.max(1))
}

/// Progress after finishing the frame at `frame_index`.
///
/// `current = floor(frame_index / sample_rate) + 1`, so the sequence of
/// `current` values produced by the batch loop is strictly increasing and
/// ends at `total`.
pub fn progress_for_frame(frame_index: u32, sample_rate: u32, frame_count: u32) -> Progress {
    let rate = sample_rate.max(1);
    let total = planned_frames(frame_count, rate);
    let current = (frame_index / rate + 1).min(total);
    let percentage = ((current as f64 / total as f64) * 100.0).round() as u32;
    Progress {
        current,
        total,
        percentage,
        current_step: None,
    }
}

// ---------------------------------------------------------------------------
// Result payload
// ---------------------------------------------------------------------------

/// Per-frame outcome accumulated by the batch runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub frame_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportText>,
    pub backends_used: Vec<String>,
}

/// Aggregate result of a multi-slice job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSliceResult {
    /// Frames that produced a usable per-frame analysis.
    pub frames_analyzed: u32,
    /// Frames visited but skipped because their analysis failed.
    pub frames_skipped: u32,
    /// Indices of skipped frames, in visit order.
    pub skipped_frame_indices: Vec<u32>,
    /// Classification label counts over analyzed frames, first-seen order.
    pub classification_histogram: IndexMap<String, u32>,
    pub frames: Vec<FrameAnalysis>,
}

impl MultiSliceResult {
    /// Fold accumulated per-frame analyses into the aggregate result.
    pub fn from_frames(frames: Vec<FrameAnalysis>, skipped_frame_indices: Vec<u32>) -> Self {
        let mut histogram: IndexMap<String, u32> = IndexMap::new();
        for frame in &frames {
            if let Some(ref classification) = frame.classification {
                *histogram.entry(classification.label.clone()).or_insert(0) += 1;
            }
        }
        Self {
            frames_analyzed: frames.len() as u32,
            frames_skipped: skipped_frame_indices.len() as u32,
            skipped_frame_indices,
            classification_histogram: histogram,
            frames,
        }
    }
}

/// The typed result stored on a completed job.
///
/// A tagged union rather than an open map, so the consolidator and the
/// document renderer can match exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    Single(Envelope),
    MultiSlice(MultiSliceResult),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
