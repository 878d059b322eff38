//! Dual-model coordination for one frame.
//!
//! Both backends are dispatched concurrently and fail independently. One
//! usable result is enough for a usable analysis; the job only fails when
//! neither backend produced anything.

use std::sync::Arc;

use axon_core::error::CoreError;
use axon_core::fusion::{self, Envelope, PatientContext};
use axon_inference::{Inference, InferenceError};

/// Runs the classifier and report generator against one frame and fuses
/// their outputs.
pub struct Coordinator {
    inference: Arc<dyn Inference>,
}

impl Coordinator {
    pub fn new(inference: Arc<dyn Inference>) -> Self {
        Self { inference }
    }

    /// Analyze one frame with both backends.
    ///
    /// Returns `Err(CoreError::Dependency)` only when both backends
    /// failed; a single failure degrades the envelope to partial
    /// availability.
    pub async fn analyze_frame(
        &self,
        image: &[u8],
        modality: &str,
        patient: Option<&PatientContext>,
    ) -> Result<Envelope, CoreError> {
        let (classify_result, report_result) = tokio::join!(
            self.inference.classify(image, modality),
            self.inference.generate_report(image, modality, None, patient),
        );

        let classification = match classify_result {
            Ok(c) => Some(c),
            Err(err) => {
                log_backend_failure("classifier", &err);
                None
            }
        };
        let report = match report_result {
            Ok(r) => Some(r),
            Err(err) => {
                log_backend_failure("report generator", &err);
                None
            }
        };

        if classification.is_none() && report.is_none() {
            return Err(CoreError::Dependency(
                "Both inference backends failed".to_string(),
            ));
        }

        Ok(fusion::fuse(classification, report, modality))
    }
}

/// Partial availability is an expected operating condition, so a single
/// backend failure logs at info rather than error.
fn log_backend_failure(backend: &str, err: &InferenceError) {
    if err.is_unavailable() {
        tracing::info!(backend, error = %err, "backend unavailable for this frame");
    } else {
        tracing::warn!(backend, error = %err, "backend returned an error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedInference;
    use assert_matches::assert_matches;
    use axon_core::fusion::{AgreementConfidence, Availability, Prediction};

    #[tokio::test]
    async fn both_backends_give_full_availability() {
        let inference = ScriptedInference::new();
        inference.push_classification("pneumonia", 0.9);
        inference.push_report("Findings consistent with pneumonia.");
        let coordinator = Coordinator::new(Arc::new(inference));

        let envelope = coordinator
            .analyze_frame(b"png", "CR", None)
            .await
            .unwrap();
        assert_eq!(envelope.fusion.availability, Availability::Full);
        let agreement = envelope.fusion.agreement.unwrap();
        assert!(agreement.agree);
        assert_eq!(agreement.confidence, AgreementConfidence::High);
    }

    #[tokio::test]
    async fn alternative_predictions_survive_fusion() {
        let inference = ScriptedInference::new();
        inference.push_classification_with_alternatives(
            "pneumonia",
            0.9,
            vec![
                Prediction { label: "effusion".to_string(), confidence: 0.06 },
                Prediction { label: "normal".to_string(), confidence: 0.04 },
            ],
        );
        inference.push_report("Findings consistent with pneumonia.");
        let coordinator = Coordinator::new(Arc::new(inference));

        let envelope = coordinator
            .analyze_frame(b"png", "CR", None)
            .await
            .unwrap();
        let classification = envelope.classification.unwrap();
        assert_eq!(classification.alternatives.len(), 2);
        assert_eq!(classification.alternatives[0].label, "effusion");
    }

    #[tokio::test]
    async fn classifier_failure_degrades_to_partial() {
        let inference = ScriptedInference::new();
        inference.push_classify_timeout();
        inference.push_report("Lungs are clear.");
        let coordinator = Coordinator::new(Arc::new(inference));

        let envelope = coordinator
            .analyze_frame(b"png", "CR", None)
            .await
            .unwrap();
        assert_eq!(envelope.fusion.availability, Availability::Partial);
        assert!(envelope.classification.is_none());
        assert!(envelope.fusion.agreement.is_none());
        assert_eq!(envelope.fusion.backends_used.len(), 1);
    }

    #[tokio::test]
    async fn report_failure_degrades_to_partial() {
        let inference = ScriptedInference::new();
        inference.push_classification("normal", 0.95);
        inference.push_report_unreachable();
        let coordinator = Coordinator::new(Arc::new(inference));

        let envelope = coordinator
            .analyze_frame(b"png", "CR", None)
            .await
            .unwrap();
        assert_eq!(envelope.fusion.availability, Availability::Partial);
        assert!((envelope.fusion.overall_confidence - 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn both_failures_are_a_dependency_error() {
        let inference = ScriptedInference::new();
        inference.push_classify_timeout();
        inference.push_report_unreachable();
        let coordinator = Coordinator::new(Arc::new(inference));

        let err = coordinator
            .analyze_frame(b"png", "CR", None)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Dependency(_));
    }
}
