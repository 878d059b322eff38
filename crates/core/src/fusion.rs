//! Dual-model result fusion: availability, agreement, and combined
//! confidence.
//!
//! The two inference backends fail independently; fusion records which of
//! them produced a usable result and, when both did, whether they agree.
//! The weights and the default report confidence are policy knobs, not
//! correctness invariants.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Confidence fusion constants
// ---------------------------------------------------------------------------

/// Weight of the classifier's softmax confidence in the overall score.
pub const CLASSIFIER_WEIGHT: f64 = 0.6;

/// Weight of the report generator's confidence in the overall score.
pub const REPORT_WEIGHT: f64 = 0.4;

/// Confidence assumed for a generated report when the backend supplies
/// none. Textual report confidence is fuzzier than a softmax score.
pub const DEFAULT_REPORT_CONFIDENCE: f64 = 0.75;

/// Labels mapped to clinically related terms for agreement checking.
const RELATED_TERMS: &[(&str, &[&str])] = &[
    ("pneumonia", &["consolidation", "infiltrate", "opacity"]),
    ("fracture", &["break", "discontinuity", "cortical disruption"]),
    ("effusion", &["fluid", "collection"]),
    ("mass", &["lesion", "tumor", "nodule"]),
];

// ---------------------------------------------------------------------------
// Backend outputs
// ---------------------------------------------------------------------------

/// Free-text patient context forwarded to the report generator.
///
/// Never validated or inspected by this system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_history: Option<String>,
}

/// A ranked alternative label from the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

/// Output of the classification backend for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    /// Softmax confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub alternatives: Vec<Prediction>,
    /// Identifier of the backend that produced this result.
    pub backend: String,
}

/// Output of the report-generation backend for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportText {
    pub findings: String,
    pub impression: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Optional self-reported confidence; most deployments omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub backend: String,
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// How many of the two backends produced a usable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Both backends succeeded.
    Full,
    /// Exactly one backend succeeded. A normal outcome under backend
    /// maintenance, not an error.
    Partial,
    /// Neither backend succeeded. A job with zero evidence is not a
    /// usable analysis; the coordinator turns this into a failure.
    Unavailable,
}

impl Availability {
    pub fn from_outcomes(classified: bool, reported: bool) -> Self {
        match (classified, reported) {
            (true, true) => Self::Full,
            (false, false) => Self::Unavailable,
            _ => Self::Partial,
        }
    }
}

// ---------------------------------------------------------------------------
// Agreement
// ---------------------------------------------------------------------------

/// Strength of the classifier/report agreement signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementConfidence {
    High,
    Medium,
    Low,
}

/// Whether the two backends point at the same condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    pub agree: bool,
    pub confidence: AgreementConfidence,
    pub note: String,
    /// Set when the models disagree and a radiologist must review.
    pub review_required: bool,
}

/// Check whether the classifier's label is supported by the report's
/// findings text.
///
/// Direct case-folded substring match is `High`; a match through the
/// related-terms table is `Medium`; anything else is `Low` with the
/// review-required flag set.
pub fn check_agreement(label: &str, findings: &str) -> Agreement {
    let label_lower = label.to_lowercase();
    let findings_lower = findings.to_lowercase();

    if findings_lower.contains(&label_lower) {
        return Agreement {
            agree: true,
            confidence: AgreementConfidence::High,
            note: "Both models detected the same condition".to_string(),
            review_required: false,
        };
    }

    let related = RELATED_TERMS
        .iter()
        .find(|(l, _)| *l == label_lower)
        .map(|(_, terms)| *terms)
        .unwrap_or(&[]);

    if related.iter().any(|term| findings_lower.contains(term)) {
        return Agreement {
            agree: true,
            confidence: AgreementConfidence::Medium,
            note: "Models show related findings".to_string(),
            review_required: false,
        };
    }

    Agreement {
        agree: false,
        confidence: AgreementConfidence::Low,
        note: "Models show different findings - radiologist review required".to_string(),
        review_required: true,
    }
}

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

/// Fusion verdict attached to every analysis envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fusion {
    /// Backend identifiers that contributed, in call order.
    pub backends_used: Vec<String>,
    /// Present only when both backends succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement: Option<Agreement>,
    pub overall_confidence: f64,
    pub availability: Availability,
}

/// One analyzed image: per-backend outputs plus the fusion verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportText>,
    pub fusion: Fusion,
    pub modality: String,
}

/// Weighted overall confidence across whichever backends succeeded.
///
/// With both results: `0.6 * classifier + 0.4 * report`, where a report
/// without a self-reported confidence contributes
/// [`DEFAULT_REPORT_CONFIDENCE`]. With one result: that result's
/// confidence. With none: zero.
pub fn overall_confidence(
    classification: Option<&Classification>,
    report: Option<&ReportText>,
) -> f64 {
    match (classification, report) {
        (Some(c), Some(r)) => {
            CLASSIFIER_WEIGHT * c.confidence
                + REPORT_WEIGHT * r.confidence.unwrap_or(DEFAULT_REPORT_CONFIDENCE)
        }
        (Some(c), None) => c.confidence,
        (None, Some(r)) => r.confidence.unwrap_or(DEFAULT_REPORT_CONFIDENCE),
        (None, None) => 0.0,
    }
}

/// Fuse the outputs of both backend calls into one envelope.
///
/// Agreement is computed only when both backends succeeded. The caller is
/// responsible for rejecting `Unavailable` envelopes.
pub fn fuse(
    classification: Option<Classification>,
    report: Option<ReportText>,
    modality: &str,
) -> Envelope {
    let availability =
        Availability::from_outcomes(classification.is_some(), report.is_some());

    let mut backends_used = Vec::new();
    if let Some(ref c) = classification {
        backends_used.push(c.backend.clone());
    }
    if let Some(ref r) = report {
        backends_used.push(r.backend.clone());
    }

    let agreement = match (&classification, &report) {
        (Some(c), Some(r)) => Some(check_agreement(&c.label, &r.findings)),
        _ => None,
    };

    let overall = overall_confidence(classification.as_ref(), report.as_ref());

    Envelope {
        classification,
        report,
        fusion: Fusion {
            backends_used,
            agreement,
            overall_confidence: overall,
            availability,
        },
        modality: modality.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
