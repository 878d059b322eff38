//! Summary statistics for consolidated reports.
//!
//! Folds the per-frame outcomes of many completed single-frame jobs into
//! one histogram/most-common/average summary. Pure functions; fetching and
//! persistence live in the orchestrator crate.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::fusion::{Classification, ReportText};
use crate::types::Timestamp;

/// Classification label excluded from histograms: it carries no signal.
pub const UNKNOWN_LABEL: &str = "unknown";

/// One AI-processed frame's contribution to a consolidated report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    /// Id of the analysis job this frame came from.
    pub job_id: String,
    pub frame_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportText>,
    pub backends_used: Vec<String>,
    pub analyzed_at: Timestamp,
}

/// Study-level summary over all AI-processed frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_processed: u32,
    pub total_requested: u32,
    /// Label counts in first-seen order (ties in `most_common_label`
    /// resolve to the earlier label, so callers get deterministic output
    /// for a fixed input order).
    pub classification_histogram: IndexMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_common_label: Option<String>,
    /// Mean classification confidence over frames with confidence > 0.
    pub average_confidence: f64,
    /// Union of contributing backend identifiers, first-seen order.
    pub backends_used: Vec<String>,
    /// Set when no frame was AI-processed; the report is still valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Compute the summary block for a consolidated report.
///
/// `frames` holds only AI-processed frames; `total_requested` is the number
/// of jobs the caller supplied. An empty `frames` slice yields a summary
/// with a warning and an empty histogram rather than an error, since an
/// all-failed batch is still a reportable outcome.
pub fn summarize(frames: &[FrameSummary], total_requested: u32) -> ReportSummary {
    if frames.is_empty() {
        return ReportSummary {
            total_processed: 0,
            total_requested,
            classification_histogram: IndexMap::new(),
            most_common_label: None,
            average_confidence: 0.0,
            backends_used: Vec::new(),
            warning: Some(
                "No frames were processed by the inference backends".to_string(),
            ),
        };
    }

    let mut histogram: IndexMap<String, u32> = IndexMap::new();
    let mut backends_used: Vec<String> = Vec::new();
    let mut confidence_sum = 0.0;
    let mut confidence_count = 0u32;

    for frame in frames {
        for backend in &frame.backends_used {
            if !backends_used.contains(backend) {
                backends_used.push(backend.clone());
            }
        }

        if let Some(ref classification) = frame.classification {
            if classification.label != UNKNOWN_LABEL {
                *histogram.entry(classification.label.clone()).or_insert(0) += 1;
            }
            // Zero confidence means the classifier had no real signal;
            // excluding it keeps the mean honest.
            if classification.confidence > 0.0 {
                confidence_sum += classification.confidence;
                confidence_count += 1;
            }
        }
    }

    let most_common_label = most_common(&histogram);
    let average_confidence = if confidence_count > 0 {
        confidence_sum / confidence_count as f64
    } else {
        0.0
    };

    ReportSummary {
        total_processed: frames.len() as u32,
        total_requested,
        classification_histogram: histogram,
        most_common_label,
        average_confidence,
        backends_used,
        warning: None,
    }
}

/// Histogram entry with the highest count; ties resolve to the label seen
/// first in the input order.
fn most_common(histogram: &IndexMap<String, u32>) -> Option<String> {
    let mut best: Option<(&String, u32)> = None;
    for (label, &count) in histogram {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((label, count)),
        }
    }
    best.map(|(label, _)| label.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
