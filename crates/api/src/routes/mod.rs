pub mod health;
pub mod merge;
pub mod progress;

use axum::Router;

use crate::state::AppState;

/// Build the long-lived `/api` routes.
///
/// ```text
/// /merge                 POST submit (blocking JSON or SSE, per config)
/// /progress              WebSocket progress feed
/// /progress/stream       SSE progress feed
/// ```
///
/// `/merge/status` lives in [`merge::status_router`] because it is subject
/// to the request timeout and these are not.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(merge::router())
        .merge(progress::router())
}
