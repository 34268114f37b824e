//! Real-time WebSocket channel.
//!
//! Each connection is one viewer subscription. The first frame is always
//! `initial-state`; afterwards every published event is forwarded in order.
//! Viewers may send `request-devices`, `request-notifications` or
//! `request-system-stats`; the reply goes to that viewer only, through the
//! same queue so it stays ordered with broadcasts.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use proxima_core::{ClientCommand, ProximaError, SubscriberId, Subscription};

use crate::api::error::{ApiError, ErrorResponse};
use crate::state::SharedState;

/// Creates the real-time router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/ws", get(ws_handler))
}

/// Upgrade to the real-time channel.
#[utoipa::path(
    get,
    path = "/ws",
    tag = "realtime",
    operation_id = "connectRealtime",
    summary = "Open the real-time channel",
    description = "Upgrades to a WebSocket. Server frames are JSON objects \
        `{\"event\": <name>, \"data\": <payload>}` with names initial-state, \
        device-snapshot-update, priority-update, notification-created, \
        notifications-cleared, notifications-snapshot, system-stats-update and \
        system-alert. Clients may send `{\"event\": \"request-devices\"}`, \
        `{\"event\": \"request-notifications\"}` or \
        `{\"event\": \"request-system-stats\"}`.",
    responses(
        (status = 101, description = "Switching to WebSocket"),
        (status = 503, description = "Server is shutting down", body = ErrorResponse)
    )
)]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    let closed = state.read().await.is_closed();
    if closed {
        return ApiError::from(ProximaError::ShuttingDown).into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let subscription = state.write().await.connect_viewer();
    let Subscription { id, mut receiver } = match subscription {
        Ok(subscription) => subscription,
        Err(ProximaError::ShuttingDown) => {
            tracing::debug!("Viewer arrived during shutdown");
            return;
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to register viewer");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = receiver.recv() => {
                let Some(frame) = frame else {
                    // Queue closed by shutdown.
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                if let Err(err) = sink.send(Message::Text(frame.to_string().into())).await {
                    tracing::debug!(viewer = %id, error = %err, "Viewer send failed");
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_command(&state, id, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(viewer = %id, error = %err, "Viewer connection error");
                    break;
                }
            }
        }
    }

    state.write().await.disconnect_viewer(id);
}

async fn handle_command(state: &SharedState, id: SubscriberId, text: &str) {
    let command = match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) => command,
        Err(err) => {
            tracing::debug!(viewer = %id, error = %err, "Ignoring unrecognized viewer message");
            return;
        }
    };

    tracing::debug!(viewer = %id, ?command, "Viewer command");
    if let Err(err) = state.write().await.answer(id, command) {
        tracing::error!(viewer = %id, error = %err, "Failed to answer viewer command");
    }
}
