//! REST clients for the classification and report-generation backends.
//!
//! Both backends take a base64-encoded image and answer JSON. Each call
//! carries its own deadline: classification is a single forward pass,
//! report generation is autoregressive and gets a much longer budget.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use axon_core::fusion::{Classification, PatientContext, Prediction, ReportText};

use crate::error::InferenceError;

/// Identifier of the classification backend in results and logs.
pub const CLASSIFIER_BACKEND: &str = "medsigclip";

/// Identifier of the report-generation backend.
pub const REPORT_BACKEND: &str = "medgemma";

/// Deadline for a classification call.
pub const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for a report-generation call.
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// One image-analysis call per backend, plus a health probe.
#[async_trait]
pub trait Inference: Send + Sync {
    /// Classify one image. The image bytes are encoded for transport by
    /// the implementation.
    async fn classify(
        &self,
        image: &[u8],
        modality: &str,
    ) -> Result<Classification, InferenceError>;

    /// Generate a structured report for one image. `label_hint` is the
    /// classifier's label when available; the backend may use it to focus
    /// the report.
    async fn generate_report(
        &self,
        image: &[u8],
        modality: &str,
        label_hint: Option<&str>,
        patient: Option<&PatientContext>,
    ) -> Result<ReportText, InferenceError>;

    /// Probe both backends. Never fails; unreachable backends are
    /// reported as unhealthy.
    async fn health(&self) -> HealthReport;
}

/// Health of one backend.
#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    pub name: String,
    pub healthy: bool,
    /// Round-trip time of the probe.
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Health of both backends.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub classifier: BackendHealth,
    pub report_generator: BackendHealth,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Endpoints and deadlines for the two model services.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Base URL of the classification service, e.g. `http://host:8001`.
    pub classifier_url: String,
    /// Base URL of the report-generation service.
    pub report_url: String,
    pub classify_timeout: Duration,
    pub report_timeout: Duration,
}

impl InferenceConfig {
    pub fn new(classifier_url: String, report_url: String) -> Self {
        Self {
            classifier_url,
            report_url,
            classify_timeout: CLASSIFY_TIMEOUT,
            report_timeout: REPORT_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    /// Base64-encoded image bytes.
    image: String,
    modality: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    label: String,
    confidence: f64,
    #[serde(default)]
    predictions: Vec<WirePrediction>,
}

#[derive(Deserialize)]
struct WirePrediction {
    label: String,
    confidence: f64,
}

#[derive(Serialize)]
struct ReportRequest<'a> {
    image: String,
    modality: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    classification_hint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    patient_context: Option<&'a PatientContext>,
}

#[derive(Deserialize)]
struct ReportResponse {
    findings: String,
    impression: String,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// [`Inference`] over HTTP against the two model services.
pub struct HttpInference {
    client: reqwest::Client,
    config: InferenceConfig,
}

impl HttpInference {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, config: InferenceConfig) -> Self {
        Self { client, config }
    }

    async fn probe(&self, name: &str, base_url: &str) -> BackendHealth {
        let started = std::time::Instant::now();
        let result = self
            .client
            .get(format!("{base_url}/health"))
            .timeout(Duration::from_secs(3))
            .send()
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) if response.status().is_success() => BackendHealth {
                name: name.to_string(),
                healthy: true,
                latency_ms,
                detail: None,
            },
            Ok(response) => BackendHealth {
                name: name.to_string(),
                healthy: false,
                latency_ms,
                detail: Some(format!("status {}", response.status().as_u16())),
            },
            Err(err) => BackendHealth {
                name: name.to_string(),
                healthy: false,
                latency_ms,
                detail: Some(err.to_string()),
            },
        }
    }

    /// Ensure a success status, or capture the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, InferenceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(InferenceError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, InferenceError> {
        let response = Self::ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| InferenceError::Malformed(err.to_string()))
    }
}

#[async_trait]
impl Inference for HttpInference {
    async fn classify(
        &self,
        image: &[u8],
        modality: &str,
    ) -> Result<Classification, InferenceError> {
        let body = ClassifyRequest {
            image: BASE64.encode(image),
            modality,
        };

        let response = self
            .client
            .post(format!("{}/classify", self.config.classifier_url))
            .timeout(self.config.classify_timeout)
            .json(&body)
            .send()
            .await
            .map_err(InferenceError::from_reqwest)?;

        let parsed: ClassifyResponse = Self::parse_response(response).await?;
        tracing::debug!(
            backend = CLASSIFIER_BACKEND,
            label = %parsed.label,
            confidence = parsed.confidence,
            "classification received"
        );

        Ok(Classification {
            label: parsed.label,
            confidence: parsed.confidence,
            alternatives: parsed
                .predictions
                .into_iter()
                .map(|p| Prediction {
                    label: p.label,
                    confidence: p.confidence,
                })
                .collect(),
            backend: CLASSIFIER_BACKEND.to_string(),
        })
    }

    async fn generate_report(
        &self,
        image: &[u8],
        modality: &str,
        label_hint: Option<&str>,
        patient: Option<&PatientContext>,
    ) -> Result<ReportText, InferenceError> {
        let body = ReportRequest {
            image: BASE64.encode(image),
            modality,
            classification_hint: label_hint,
            patient_context: patient,
        };

        let response = self
            .client
            .post(format!("{}/generate-report", self.config.report_url))
            .timeout(self.config.report_timeout)
            .json(&body)
            .send()
            .await
            .map_err(InferenceError::from_reqwest)?;

        let parsed: ReportResponse = Self::parse_response(response).await?;
        tracing::debug!(backend = REPORT_BACKEND, "report received");

        Ok(ReportText {
            findings: parsed.findings,
            impression: parsed.impression,
            recommendations: parsed.recommendations,
            confidence: parsed.confidence,
            backend: REPORT_BACKEND.to_string(),
        })
    }

    async fn health(&self) -> HealthReport {
        let classifier = self
            .probe(CLASSIFIER_BACKEND, &self.config.classifier_url)
            .await;
        let report_generator = self.probe(REPORT_BACKEND, &self.config.report_url).await;
        HealthReport {
            classifier,
            report_generator,
        }
    }
}
