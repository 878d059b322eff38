//! Frame retrieval from the imaging archive.
//!
//! Frames are fetched as rendered PNG bytes. A missing frame is a normal
//! condition during batch runs, so it is surfaced as `None` rather than
//! an error.

use async_trait::async_trait;

use crate::error::InferenceError;

/// Source of rendered frame bytes.
#[async_trait]
pub trait FrameStore: Send + Sync {
    /// Fetch one rendered frame. Returns `None` when the archive has no
    /// such frame.
    async fn get_frame(
        &self,
        study_id: &str,
        frame_index: u32,
    ) -> Result<Option<Vec<u8>>, InferenceError>;
}

/// [`FrameStore`] over the archive's HTTP rendering endpoint.
pub struct HttpFrameStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFrameStore {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn frame_url(&self, study_id: &str, frame_index: u32) -> String {
        // Archive frame numbers are 1-based; ours are 0-based.
        format!(
            "{}/studies/{}/frames/{}/rendered",
            self.base_url,
            study_id,
            frame_index + 1
        )
    }
}

#[async_trait]
impl FrameStore for HttpFrameStore {
    async fn get_frame(
        &self,
        study_id: &str,
        frame_index: u32,
    ) -> Result<Option<Vec<u8>>, InferenceError> {
        let response = self
            .client
            .get(self.frame_url(study_id, frame_index))
            .header(reqwest::header::ACCEPT, "image/png")
            .send()
            .await
            .map_err(InferenceError::from_reqwest)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(study_id, frame_index, "frame not found in archive");
            return Ok(None);
        }

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

        let bytes = response
            .bytes()
            .await
            .map_err(InferenceError::from_reqwest)?;
        Ok(Some(bytes.to_vec()))
    }
}
