/// Errors from the model backend and frame source HTTP layers.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// The backend could not be reached (connection refused, DNS, TLS).
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// The request exceeded its deadline.
    #[error("Backend timed out: {0}")]
    Timeout(String),

    /// The backend answered with a non-2xx status code.
    #[error("Backend error ({status}): {body}")]
    Api {
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body could not be decoded into the expected shape.
    #[error("Malformed backend response: {0}")]
    Malformed(String),
}

impl InferenceError {
    /// Whether the failure means the backend is down rather than the
    /// request being wrong. Per-backend failures of this class degrade a
    /// job to partial availability instead of failing it.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Unreachable(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}
