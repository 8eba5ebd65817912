//! Handlers for merge job submission and slot status.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use merge_core::request::JobRequest;

use crate::config::SubmissionMode;
use crate::error::{AppError, AppResult};
use crate::handlers::progress::submitter_sse;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/merge
///
/// Validate and start a merge job. In blocking mode the response is held
/// until the job is terminal and carries its `MergeSummary` (or the mapped
/// error). In stream mode the response is an SSE stream of the job's events
/// ending with its terminal event.
pub async fn submit_merge(
    State(state): State<AppState>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    match state.config.submission_mode {
        SubmissionMode::Blocking => {
            let handle = state.runner.start(request)?;
            tracing::info!(job_id = %handle.id(), "Merge job accepted, waiting for outcome");

            let summary = handle.wait().await?;
            Ok(Json(DataResponse { data: summary }).into_response())
        }
        SubmissionMode::Stream => {
            let (handle, subscription) = state.runner.start_observed(request)?;
            tracing::info!(job_id = %handle.id(), "Merge job accepted, streaming progress");

            Ok(submitter_sse(subscription, handle).into_response())
        }
    }
}

/// Any non-POST method on `/api/merge`.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// GET /api/merge/status
pub async fn merge_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: state.runner.snapshot(),
    })
}
