use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use merge_events::{ProgressChannel, Subscription};

use crate::state::AppState;

/// Interval between heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// HTTP handler that upgrades the connection to a progress WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.channel))
}

/// Manage a single progress WebSocket after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Subscribes to the progress channel.
///   2. Spawns a sender task that forwards events and heartbeat pings.
///   3. Processes inbound frames on the current task.
///   4. Ends when either side finishes; the subscription is dropped with
///      the sender task.
async fn handle_socket(socket: WebSocket, channel: Arc<ProgressChannel>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let subscription = channel.subscribe();
    tracing::info!(
        conn_id = %conn_id,
        subscriber_id = subscription.id(),
        "Progress WebSocket connected",
    );

    let (sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(forward_events(subscription, sink, conn_id.clone()));

    let recv_conn_id = conn_id.clone();
    let recv_loop = async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(Message::Pong(_)) => {
                    tracing::trace!(conn_id = %recv_conn_id, "Pong received");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(conn_id = %recv_conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = &mut send_task => {}
        () = recv_loop => send_task.abort(),
    }

    tracing::info!(conn_id = %conn_id, "Progress WebSocket disconnected");
}

/// Forward events from `subscription` as JSON text frames, interleaved with
/// heartbeat pings. After a terminal event a Close frame is sent and the
/// task ends. Socket writes happen here, never under the channel lock.
async fn forward_events(
    mut subscription: Subscription,
    mut sink: SplitSink<WebSocket, Message>,
    conn_id: String,
) {
    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
        HEARTBEAT_INTERVAL,
    );

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    // Dropped by the channel (too slow, or shutdown).
                    tracing::debug!(conn_id = %conn_id, "Progress subscription ended");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                let text = match serde_json::to_string(&event.to_payload()) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(conn_id = %conn_id, error = %e, "Failed to serialize progress payload");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
                    break;
                }
                if event.is_terminal() {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
            _ = heartbeat.tick() => {
                tracing::trace!(conn_id = %conn_id, "WebSocket heartbeat ping");
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
                    break;
                }
            }
        }
    }
}
