use axum::routing::get;
use axum::Router;

use crate::handlers::progress;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/api`.
///
/// ```text
/// GET    /progress          -> WebSocket upgrade
/// GET    /progress/stream   -> progress_stream (SSE)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/progress", get(ws::ws_handler))
        .route("/progress/stream", get(progress::progress_stream))
}
