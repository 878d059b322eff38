//! Plain-text document rendering for completed analyses and consolidated
//! reports.
//!
//! Pure string assembly; handlers attach the transport headers. Every
//! document ends with the radiologist-review disclaimer.

use axon_core::error::CoreError;
use axon_core::fusion::{AgreementConfidence, Availability, Envelope};
use axon_core::job::{JobResult, JobStatus, MultiSliceResult};
use axon_db::models::job::AnalysisJob;
use axon_db::models::report::ConsolidatedReport;

const RULE: &str = "==============================================================";

const DISCLAIMER: &str = "\
This document was generated automatically by AI models and is not a\n\
clinical diagnosis. All findings require review by a qualified\n\
radiologist.";

/// Render a completed analysis job as a sectioned text document.
///
/// Only `Complete` jobs have a renderable result; anything else is a
/// conflict.
pub fn render_job(job: &AnalysisJob) -> Result<String, CoreError> {
    if job.status()? != JobStatus::Complete {
        return Err(CoreError::Conflict(format!(
            "Analysis {} is not complete (status: {})",
            job.id, job.status
        )));
    }
    let result = job.result().ok_or_else(|| {
        CoreError::Internal(format!("Complete job {} has no result", job.id))
    })?;

    let mut doc = String::new();
    push_header(&mut doc, "AI ANALYSIS REPORT");
    doc.push_str(&format!("Analysis ID:  {}\n", job.id));
    if let Some(completed_at) = job.completed_at {
        doc.push_str(&format!(
            "Completed:    {}\n",
            completed_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    doc.push('\n');

    push_section(&mut doc, "STUDY INFORMATION");
    doc.push_str(&format!("Study:       {}\n", job.study_id));
    if let Some(ref series_id) = job.series_id {
        doc.push_str(&format!("Series:      {series_id}\n"));
    }
    doc.push_str(&format!("Modality:    {}\n", job.modality));

    match result {
        JobResult::Single(envelope) => {
            doc.push_str(&format!("Frame:       {}\n\n", job.frame_index));
            push_envelope(&mut doc, envelope);
        }
        JobResult::MultiSlice(multi) => {
            if let Some(frame_count) = job.frame_count {
                doc.push_str(&format!("Frames:      {frame_count}\n"));
            }
            doc.push('\n');
            push_multi_slice(&mut doc, multi);
        }
    }

    push_footer(&mut doc);
    Ok(doc)
}

/// Render a consolidated report as a sectioned text document.
pub fn render_report(report: &ConsolidatedReport) -> String {
    let summary = &report.summary.0;

    let mut doc = String::new();
    push_header(&mut doc, "CONSOLIDATED AI ANALYSIS REPORT");
    doc.push_str(&format!("Report ID:    {}\n", report.id));
    doc.push_str(&format!("Study:        {}\n", report.study_id));
    doc.push_str(&format!(
        "Generated:    {}\n\n",
        report.created_at.format("%Y-%m-%d %H:%M UTC")
    ));

    push_section(&mut doc, "SUMMARY");
    doc.push_str(&format!(
        "Frames analyzed:     {} of {} requested\n",
        summary.total_processed, summary.total_requested
    ));
    if let Some(ref label) = summary.most_common_label {
        doc.push_str(&format!("Predominant finding: {label}\n"));
    }
    if summary.average_confidence > 0.0 {
        doc.push_str(&format!(
            "Average confidence:  {}\n",
            percent(summary.average_confidence)
        ));
    }
    if !summary.backends_used.is_empty() {
        doc.push_str(&format!(
            "Models used:         {}\n",
            summary.backends_used.join(", ")
        ));
    }
    if let Some(ref warning) = summary.warning {
        doc.push_str(&format!("\nWARNING: {warning}\n"));
    }

    if !summary.classification_histogram.is_empty() {
        doc.push('\n');
        push_section(&mut doc, "FINDINGS DISTRIBUTION");
        for (label, count) in &summary.classification_histogram {
            doc.push_str(&format!("  {label}: {count} frame(s)\n"));
        }
    }

    if !report.per_frame.0.is_empty() {
        doc.push('\n');
        push_section(&mut doc, "PER-FRAME BREAKDOWN");
        for frame in &report.per_frame.0 {
            match frame.classification {
                Some(ref classification) => doc.push_str(&format!(
                    "  Frame {:>4}: {} ({})  [{}]\n",
                    frame.frame_index,
                    classification.label,
                    percent(classification.confidence),
                    frame.job_id
                )),
                None => doc.push_str(&format!(
                    "  Frame {:>4}: no classification  [{}]\n",
                    frame.frame_index, frame.job_id
                )),
            }
        }
    }

    push_footer(&mut doc);
    doc
}

// ---------------------------------------------------------------------------
// Section helpers
// ---------------------------------------------------------------------------

fn push_header(doc: &mut String, title: &str) {
    doc.push_str(RULE);
    doc.push('\n');
    doc.push_str(&format!("{title:^62}\n"));
    doc.push_str(RULE);
    doc.push_str("\n\n");
}

fn push_section(doc: &mut String, title: &str) {
    doc.push_str(&format!("--- {title} ---\n"));
}

fn push_footer(doc: &mut String) {
    doc.push('\n');
    doc.push_str(RULE);
    doc.push('\n');
    doc.push_str(DISCLAIMER);
    doc.push('\n');
}

fn push_envelope(doc: &mut String, envelope: &Envelope) {
    if let Some(ref classification) = envelope.classification {
        push_section(doc, &format!("AI CLASSIFICATION ({})", classification.backend));
        doc.push_str(&format!("Finding:     {}\n", classification.label));
        doc.push_str(&format!(
            "Confidence:  {}\n",
            percent(classification.confidence)
        ));
        if !classification.alternatives.is_empty() {
            doc.push_str("Alternatives:\n");
            for alternative in &classification.alternatives {
                doc.push_str(&format!(
                    "  - {} ({})\n",
                    alternative.label,
                    percent(alternative.confidence)
                ));
            }
        }
        doc.push('\n');
    }

    if let Some(ref report) = envelope.report {
        push_section(doc, &format!("CLINICAL REPORT ({})", report.backend));
        doc.push_str(&format!("Findings:\n{}\n\n", report.findings));
        doc.push_str(&format!("Impression:\n{}\n", report.impression));
        if !report.recommendations.is_empty() {
            doc.push_str("Recommendations:\n");
            for recommendation in &report.recommendations {
                doc.push_str(&format!("  - {recommendation}\n"));
            }
        }
        doc.push('\n');
    }

    push_section(doc, "COMBINED ANALYSIS");
    doc.push_str(&format!(
        "Availability:        {}\n",
        availability_label(envelope.fusion.availability)
    ));
    doc.push_str(&format!(
        "Overall confidence:  {}\n",
        percent(envelope.fusion.overall_confidence)
    ));
    if let Some(ref agreement) = envelope.fusion.agreement {
        doc.push_str(&format!(
            "Model agreement:     {} ({})\n",
            agreement.note,
            agreement_label(agreement.confidence)
        ));
        doc.push_str(&format!(
            "Radiologist review:  {}\n",
            if agreement.review_required {
                "REQUIRED"
            } else {
                "recommended"
            }
        ));
    }
}

fn push_multi_slice(doc: &mut String, multi: &MultiSliceResult) {
    push_section(doc, "BATCH SUMMARY");
    doc.push_str(&format!("Frames analyzed:  {}\n", multi.frames_analyzed));
    doc.push_str(&format!("Frames skipped:   {}\n", multi.frames_skipped));
    if !multi.classification_histogram.is_empty() {
        doc.push_str("Findings:\n");
        for (label, count) in &multi.classification_histogram {
            doc.push_str(&format!("  {label}: {count} frame(s)\n"));
        }
    }

    doc.push('\n');
    push_section(doc, "PER-SLICE BREAKDOWN");
    for frame in &multi.frames {
        match frame.classification {
            Some(ref classification) => doc.push_str(&format!(
                "  Frame {:>4}: {} ({})\n",
                frame.frame_index,
                classification.label,
                percent(classification.confidence)
            )),
            None => doc.push_str(&format!(
                "  Frame {:>4}: no classification\n",
                frame.frame_index
            )),
        }
    }
    if !multi.skipped_frame_indices.is_empty() {
        let skipped: Vec<String> = multi
            .skipped_frame_indices
            .iter()
            .map(|index| index.to_string())
            .collect();
        doc.push_str(&format!("  Skipped frames: {}\n", skipped.join(", ")));
    }
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn availability_label(availability: Availability) -> &'static str {
    match availability {
        Availability::Full => "full (both models)",
        Availability::Partial => "partial (one model)",
        Availability::Unavailable => "unavailable",
    }
}

fn agreement_label(confidence: AgreementConfidence) -> &'static str {
    match confidence {
        AgreementConfidence::High => "high confidence",
        AgreementConfidence::Medium => "medium confidence",
        AgreementConfidence::Low => "low confidence",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::fusion::{self, Classification, ReportText};
    use axon_core::job::JobKind;
    use sqlx::types::Json;

    fn job_row(status: JobStatus, result: Option<JobResult>) -> AnalysisJob {
        AnalysisJob {
            id: "AI-2026-08-25-ABC123".to_string(),
            kind: JobKind::Single.as_str().to_string(),
            status: status.as_str().to_string(),
            study_id: "1.2.3".to_string(),
            series_id: Some("1.2.3.4".to_string()),
            instance_id: None,
            frame_index: 0,
            frame_count: None,
            sample_rate: None,
            modality: "CR".to_string(),
            patient_context: None,
            progress_current: 1,
            progress_total: 1,
            progress_percentage: 100,
            current_step: None,
            result: result.map(Json),
            error: None,
            retry_count: 0,
            linked_report_id: None,
            created_at: chrono::Utc::now(),
            completed_at: Some(chrono::Utc::now()),
            failed_at: None,
            cancelled_at: None,
        }
    }

    fn full_envelope() -> Envelope {
        fusion::fuse(
            Some(Classification {
                label: "pneumonia".to_string(),
                confidence: 0.9,
                alternatives: vec![],
                backend: "medsigclip".to_string(),
            }),
            Some(ReportText {
                findings: "Dense consolidation in the right lower lobe.".to_string(),
                impression: "Findings consistent with pneumonia.".to_string(),
                recommendations: vec!["Clinical correlation recommended.".to_string()],
                confidence: None,
                backend: "medgemma".to_string(),
            }),
            "CR",
        )
    }

    #[test]
    fn renders_complete_single_job() {
        let job = job_row(
            JobStatus::Complete,
            Some(JobResult::Single(full_envelope())),
        );
        let doc = render_job(&job).unwrap();
        assert!(doc.contains("AI ANALYSIS REPORT"));
        assert!(doc.contains("AI-2026-08-25-ABC123"));
        assert!(doc.contains("Finding:     pneumonia"));
        assert!(doc.contains("Confidence:  90.0%"));
        assert!(doc.contains("CLINICAL REPORT (medgemma)"));
        assert!(doc.contains("radiologist"));
    }

    #[test]
    fn incomplete_job_is_a_conflict() {
        let job = job_row(JobStatus::Processing, None);
        let err = render_job(&job).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn failed_job_is_a_conflict() {
        let job = job_row(JobStatus::Failed, None);
        assert!(render_job(&job).is_err());
    }

    #[test]
    fn partial_envelope_omits_missing_sections() {
        let envelope = fusion::fuse(
            Some(Classification {
                label: "normal".to_string(),
                confidence: 0.8,
                alternatives: vec![],
                backend: "medsigclip".to_string(),
            }),
            None,
            "CR",
        );
        let job = job_row(JobStatus::Complete, Some(JobResult::Single(envelope)));
        let doc = render_job(&job).unwrap();
        assert!(doc.contains("partial (one model)"));
        assert!(!doc.contains("CLINICAL REPORT"));
    }
}
