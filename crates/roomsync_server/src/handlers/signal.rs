use crate::config::Config;
use crate::signaling::{ClientSignal, ServerSignal, SignalHub};
use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use roomsync_core::ConnectionId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Shared state for the signaling WebSocket handler
#[derive(Clone)]
pub struct SignalState {
    pub hub: Arc<SignalHub>,
    pub config: Arc<Config>,
}

/// WebSocket upgrade handler for `/signal`
pub async fn signal_handler(
    State(state): State<SignalState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SignalState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerSignal>(state.config.outbound_buffer);
    let id = ConnectionId::new();

    info!("Signaling connected: connection={}", id);

    if send_json(&mut ws_tx, &ServerSignal::Welcome { id }).await.is_err() {
        return;
    }

    let mut ping = tokio::time::interval(state.config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let Some(msg) = msg else { break };
                last_seen = Instant::now();
                match msg {
                    Ok(Message::Text(text)) => {
                        dispatch(&state.hub, id, &out_tx, text.as_str()).await;
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = ws_tx.send(Message::Pong(data)).await {
                            debug!("Failed to send pong to {}: {}", id, e);
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Binary(_)) => {
                        warn!("Ignoring binary frame on signaling channel from {}", id);
                    }
                    Ok(Message::Pong(_)) => {}
                    Err(e) => {
                        error!("Signaling WebSocket error: {}", e);
                        break;
                    }
                }
            }

            Some(signal) = out_rx.recv() => {
                if send_json(&mut ws_tx, &signal).await.is_err() {
                    break;
                }
            }

            _ = ping.tick() => {
                if last_seen.elapsed() >= state.config.idle_timeout {
                    warn!("Closing idle signaling connection {}", id);
                    break;
                }
                if let Err(e) = ws_tx.send(Message::Ping(Bytes::new())).await {
                    debug!("Failed to ping {}: {}", id, e);
                    break;
                }
            }
        }
    }

    state.hub.leave(id).await;
    let _ = ws_tx.close().await;
    info!("Signaling disconnected: connection={}", id);
}

/// Route one client message to the hub.
async fn dispatch(
    hub: &SignalHub,
    id: ConnectionId,
    out_tx: &mpsc::Sender<ServerSignal>,
    text: &str,
) {
    let msg = match serde_json::from_str::<ClientSignal>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Dropping malformed signaling message from {}: {}", id, e);
            return;
        }
    };

    match msg {
        ClientSignal::JoinRoom { room } => {
            hub.join(id, room.as_deref(), out_tx.clone()).await;
        }
        ClientSignal::Signal { to, signal } => {
            hub.relay(id, to, signal).await;
        }
    }
}

async fn send_json<S>(ws_tx: &mut S, signal: &ServerSignal) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = match serde_json::to_string(signal) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to encode signaling message: {}", e);
            return Ok(());
        }
    };
    ws_tx.send(Message::Text(text.into())).await.map_err(|e| {
        debug!("Failed to send signaling message: {}", e);
    })
}
