//! Progress observation over Server-Sent Events.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use merge_core::job::terminal_event;
use merge_core::job_events::ProgressEvent;
use merge_events::Subscription;
use merge_runner::JobHandle;

use crate::state::AppState;

/// Render one progress event as an SSE frame named after its kind
/// (`progress`, `completed`, `failed`) with the JSON payload as data.
pub(crate) fn sse_event(event: &ProgressEvent) -> Event {
    let data = serde_json::to_string(&event.to_payload()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize progress payload");
        "{}".to_string()
    });
    Event::default().event(event.event_name()).data(data)
}

/// SSE response that forwards `subscription` until the job's terminal event.
pub(crate) fn job_event_sse(
    subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscriber_id = subscription.id();
    tracing::debug!(subscriber_id, "SSE progress stream opened");

    let events = subscription
        .into_job_stream()
        .map(|event| Ok(sse_event(&event)));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// SSE response for the submitter of a job.
///
/// Forwards `subscription` like [`job_event_sse`]. If the subscription ends
/// without a terminal event (the channel dropped it for falling behind), the
/// stream waits for `handle` and ends with the terminal event built from the
/// outcome instead.
pub(crate) fn submitter_sse(
    subscription: Subscription,
    handle: JobHandle,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let job_id = handle.id();
    let terminal_seen = Arc::new(AtomicBool::new(false));

    let seen = Arc::clone(&terminal_seen);
    let live = subscription.into_job_stream().inspect(move |event| {
        if event.is_terminal() {
            seen.store(true, Ordering::Relaxed);
        }
    });

    let outcome = futures::stream::once(async move {
        if terminal_seen.load(Ordering::Relaxed) {
            return None;
        }
        tracing::warn!(job_id = %job_id, "Submitter stream lost its subscription, reporting outcome");
        let outcome = handle.wait().await;
        Some(terminal_event(&outcome))
    })
    .filter_map(futures::future::ready);

    let events = live.chain(outcome).map(|event| Ok(sse_event(&event)));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /api/progress/stream
///
/// Observe the current or next job over SSE. Events published before the
/// connection are not replayed; the stream ends after a terminal event.
pub async fn progress_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    job_event_sse(state.channel.subscribe())
}

