use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use codereel_core::error::CoreError;
use codereel_core::job::JobStoreError;
use codereel_pipeline::PipelineError;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce `{ "error", "code" }` JSON
/// bodies with a matching status.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `codereel_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    JobStore(#[from] JobStoreError),

    /// A job that could not be started.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => core_parts(core),
            AppError::Pipeline(PipelineError::Core(core)) => core_parts(core),
            AppError::Pipeline(other) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "PIPELINE_ERROR",
                other.to_string(),
            ),

            AppError::JobStore(err) => match err {
                JobStoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                JobStoreError::AlreadyCompleted(_) => {
                    (StatusCode::CONFLICT, "CONFLICT", err.to_string())
                }
                JobStoreError::Full { .. } => {
                    tracing::warn!(error = %err, "Rejected job: store full");
                    (StatusCode::SERVICE_UNAVAILABLE, "STORE_FULL", err.to_string())
                }
            },
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn core_parts(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::InvalidEngine(_) => (StatusCode::BAD_REQUEST, "INVALID_ENGINE", core.to_string()),
        CoreError::JobNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", core.to_string()),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
