//! WebSocket route handlers: room routing and the per-connection gateway.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use super::manager::ConnectionId;
use super::rooms::MessageHandler;
use super::state::AppState;

/// Entry endpoint for `GET /ws/room/{room}`.
///
/// Routes the connection to the handler registered for `room`. Unknown
/// rooms are not allowed: the handshake is still accepted (the protocol
/// requires acceptance before a close frame can be sent) and the socket is
/// closed immediately with a policy-violation code.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
) -> impl IntoResponse {
    match state.rooms.get(&room) {
        Some(handler) => ws.on_upgrade(move |socket| handle_socket(socket, state, room, handler)),
        None => ws.on_upgrade(move |socket| reject_unknown_room(socket, room)),
    }
}

/// Accept-then-close for rooms absent from the registry. No gateway is
/// started and nothing is registered with the connection manager.
async fn reject_unknown_room(mut socket: WebSocket, room: String) {
    tracing::warn!("Rejected WebSocket connection to unsupported room: '{}'", room);

    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: "unknown room".into(),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        tracing::debug!("Failed to send close frame for room '{}': {}", room, e);
    }
}

/// Spawns a task that drains the connection's outbound channel into the
/// WebSocket sink. Both broadcasts and heartbeat pongs flow through this
/// single writer.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Own the lifecycle of one accepted connection.
///
/// Registers the socket with the connection manager, then reads frames
/// until the client disconnects or the transport fails. Heartbeat pings are
/// answered locally; everything else is parsed as JSON and dispatched to
/// the room's message handler. Per-frame failures never close the
/// connection. Cleanup removes the connection from the manager exactly
/// once, whatever the exit reason.
pub async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    room: String,
    handler: Arc<dyn MessageHandler>,
) {
    // Outbound channel for this connection; the manager holds the sender,
    // the pusher task drains the receiver into the socket.
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let conn_id = ConnectionId::new();
    state.manager.add(&room, conn_id, tx.clone()).await;
    tracing::info!("Connection '{}' joined room '{}'", conn_id, room);

    let (sender, mut receiver) = socket.split();
    let mut push_task = pusher_loop(rx, sender);

    let settings = state.settings.clone();
    let room_clone = room.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            // Disconnects and I/O failures arrive as values, not panics.
            let msg = match frame {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(
                        "WebSocket transport error in room '{}': {}",
                        room_clone,
                        e
                    );
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    // Heartbeat: local reply only, never broadcast, never Redis.
                    if text.as_str() == settings.heartbeat_ping {
                        if tx.send(settings.heartbeat_pong.clone()).is_err() {
                            break;
                        }
                        tracing::debug!(
                            "Received {} from client, responded with {}",
                            settings.heartbeat_ping,
                            settings.heartbeat_pong
                        );
                        continue;
                    }

                    let data = match serde_json::from_str::<serde_json::Value>(&text) {
                        Ok(data) => data,
                        Err(e) => {
                            tracing::error!(
                                "Invalid JSON message in room '{}': {} | raw: {}",
                                room_clone,
                                e,
                                text
                            );
                            continue;
                        }
                    };

                    // A failing handler drops this frame, not the session.
                    if let Err(e) = handler.handle(data).await {
                        tracing::error!("Unexpected handler error in room '{}': {}", room_clone, e);
                    }
                }
                Message::Binary(_) => {
                    tracing::error!("Dropping binary frame in room '{}'", room_clone);
                }
                Message::Close(_) => {
                    tracing::debug!("WebSocket client disconnected from room '{}'", room_clone);
                    break;
                }
                // Protocol-level ping/pong is handled by the transport.
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    // If either task finishes, tear down the other.
    tokio::select! {
        _ = &mut recv_task => push_task.abort(),
        _ = &mut push_task => recv_task.abort(),
    };

    state.manager.remove(&room, &conn_id).await;
    tracing::info!("Connection '{}' left room '{}'", conn_id, room);
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
