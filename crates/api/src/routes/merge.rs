//! Route definitions for merge job submission and status.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::merge;
use crate::state::AppState;

/// Routes mounted at `/api`.
///
/// ```text
/// POST   /merge           -> submit_merge
/// *      /merge           -> 405 METHOD_NOT_ALLOWED
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/merge",
        post(merge::submit_merge).fallback(merge::method_not_allowed),
    )
}

/// ```text
/// GET    /merge/status    -> merge_status
/// ```
pub fn status_router() -> Router<AppState> {
    Router::new().route("/merge/status", get(merge::merge_status))
}
