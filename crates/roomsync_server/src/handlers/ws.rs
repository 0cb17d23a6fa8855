use crate::config::Config;
use crate::sync::{ClientConnection, RoomRegistry};
use axum::{
    body::Bytes,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Room name; blank or absent means the default room
    pub room: Option<String>,
}

/// Shared state for WebSocket handler
#[derive(Clone)]
pub struct WsState {
    pub registry: Arc<RoomRegistry>,
    pub config: Arc<Config>,
}

/// WebSocket upgrade handler for `/yjs?room=...`
pub async fn ws_handler(
    State(state): State<WsState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade(ws, state, query.room)
}

/// WebSocket upgrade handler for `/yjs/{room}`
pub async fn ws_room_handler(
    State(state): State<WsState>,
    Path(room): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade(ws, state, Some(room))
}

fn upgrade(ws: WebSocketUpgrade, state: WsState, room: Option<String>) -> impl IntoResponse {
    debug!("WebSocket upgrade: room={:?}", room);
    ws.on_upgrade(move |socket| handle_socket(socket, state, room))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: WsState, room: Option<String>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Bytes>(state.config.outbound_buffer);

    let mut connection = ClientConnection::join(&state.registry, room.as_deref(), out_tx).await;
    let conn_id = connection.id();
    let room_id = connection.room().room_id().to_string();

    info!("WebSocket connected: connection={}, room={}", conn_id, room_id);

    let mut ping = tokio::time::interval(state.config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = ws_rx.next() => {
                let Some(msg) = msg else { break };
                last_seen = Instant::now();
                match msg {
                    Ok(Message::Binary(data)) => connection.handle_frame(&data).await,
                    Ok(Message::Close(_)) => {
                        debug!("Client requested close");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = ws_tx.send(Message::Pong(data)).await {
                            debug!("Failed to send pong to {}: {}", conn_id, e);
                            break;
                        }
                    }
                    Ok(Message::Text(_)) => {
                        warn!("Ignoring text frame on document channel from {}", conn_id);
                    }
                    // Pongs only refresh last_seen
                    Ok(Message::Pong(_)) => {}
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                }
            }

            // Drain the outbound queue (handshake, replies and broadcasts)
            Some(frame) = out_rx.recv() => {
                if let Err(e) = ws_tx.send(Message::Binary(frame)).await {
                    debug!("Failed to send to {}: {}", conn_id, e);
                    break;
                }
            }

            _ = ping.tick() => {
                if last_seen.elapsed() >= state.config.idle_timeout {
                    warn!("Closing idle connection {} in room {}", conn_id, room_id);
                    break;
                }
                if let Err(e) = ws_tx.send(Message::Ping(Bytes::new())).await {
                    debug!("Failed to ping {}: {}", conn_id, e);
                    break;
                }
            }
        }
    }

    connection.close().await;
    let _ = ws_tx.close().await;

    info!(
        "WebSocket disconnected: connection={}, room={}",
        conn_id, room_id
    );
}
