use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use merge_core::error::JobError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`JobError`] for job lifecycle errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent
/// `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A job lifecycle error from `merge_core`.
    #[error(transparent)]
    Job(#[from] JobError),

    /// A body that could not be parsed as a job request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The route exists but not for this HTTP method.
    #[error("Method not allowed")]
    MethodNotAllowed,
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- JobError variants ---
            AppError::Job(job) => {
                let status = match job {
                    JobError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    JobError::AlreadyRunning => StatusCode::CONFLICT,
                    JobError::LaunchFailed(_) | JobError::ProcessFailed { .. } => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    JobError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
                };
                let message = match job {
                    JobError::InvalidRequest(msg) => msg.clone(),
                    JobError::ProcessFailed { stderr, .. } => stderr.clone(),
                    JobError::LaunchFailed(_) => {
                        tracing::error!(error = %job, "Merge launch failed");
                        job.to_string()
                    }
                    other => other.to_string(),
                };
                (status, job.code(), message)
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "METHOD_NOT_ALLOWED",
                "Method not allowed".to_string(),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
