use std::time::Duration;

use axon_inference::InferenceConfig;
use axon_orchestrator::BatchMode;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In
/// production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`).
    pub request_timeout_secs: u64,
    /// Base URL of the classification backend.
    pub classifier_url: String,
    /// Base URL of the report-generation backend.
    pub report_model_url: String,
    /// Base URL of the imaging archive's frame endpoint.
    pub frame_store_url: String,
    /// Per-frame depth for batch jobs.
    pub batch_mode: BatchMode,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `60`                       |
    /// | `CLASSIFIER_URL`       | `http://localhost:8001`    |
    /// | `REPORT_MODEL_URL`     | `http://localhost:8002`    |
    /// | `FRAME_STORE_URL`      | `http://localhost:8042`    |
    /// | `BATCH_MODE`           | `classify_only`            |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let classifier_url =
            std::env::var("CLASSIFIER_URL").unwrap_or_else(|_| "http://localhost:8001".into());
        let report_model_url =
            std::env::var("REPORT_MODEL_URL").unwrap_or_else(|_| "http://localhost:8002".into());
        let frame_store_url =
            std::env::var("FRAME_STORE_URL").unwrap_or_else(|_| "http://localhost:8042".into());

        let batch_mode = match std::env::var("BATCH_MODE").as_deref() {
            Ok("full") => BatchMode::Full,
            _ => BatchMode::ClassifyOnly,
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            classifier_url,
            report_model_url,
            frame_store_url,
            batch_mode,
        }
    }

    /// Inference client configuration derived from the server config.
    pub fn inference(&self) -> InferenceConfig {
        InferenceConfig::new(self.classifier_url.clone(), self.report_model_url.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
