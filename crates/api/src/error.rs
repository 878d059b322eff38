use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use axon_core::error::CoreError;
use axon_db::store::StoreError;
use axon_orchestrator::OrchestratorError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `axon_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Core(core) => Self::Core(core),
            OrchestratorError::Store(StoreError::Database(db)) => Self::Database(db),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = status_of(&self);

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn status_of(err: &AppError) -> (StatusCode, &'static str, String) {
    match err {
        AppError::Core(core) => match core {
            CoreError::NotFound { entity, id } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} with id {id} not found"),
            ),
            CoreError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            CoreError::Dependency(msg) => (
                StatusCode::BAD_GATEWAY,
                "DEPENDENCY_UNAVAILABLE",
                msg.clone(),
            ),
            CoreError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal core error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        },

        AppError::Database(db) => {
            tracing::error!(error = %db, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }

        AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: AppError) -> StatusCode {
        status_of(&err).0
    }

    #[test]
    fn not_found_is_404() {
        let err = AppError::Core(CoreError::NotFound {
            entity: "analysis job",
            id: "AI-1".to_string(),
        });
        assert_eq!(status(err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_is_400() {
        let err = AppError::Core(CoreError::Validation("bad".to_string()));
        assert_eq!(status(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conflict_is_409() {
        let err = AppError::Core(CoreError::Conflict("busy".to_string()));
        assert_eq!(status(err), StatusCode::CONFLICT);
    }

    #[test]
    fn dependency_is_502() {
        let err = AppError::Core(CoreError::Dependency("backends down".to_string()));
        assert_eq!(status(err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn internal_is_sanitized_500() {
        let err = AppError::Core(CoreError::Internal("secret detail".to_string()));
        let (code, _, message) = status_of(&err);
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("secret"));
    }
}
