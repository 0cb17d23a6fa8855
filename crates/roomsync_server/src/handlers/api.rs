use crate::signaling::SignalHub;
use crate::sync::RoomRegistry;
use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Json},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<RoomRegistry>,
    pub hub: Arc<SignalHub>,
}

/// Server statistics response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub status: String,
    pub version: String,
    pub active_connections: usize,
    pub active_rooms: usize,
    pub signal_connections: usize,
    pub signal_rooms: usize,
}

/// Create API routes
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .with_state(state)
}

/// GET /api/stats - Room and connection counts for both channels
async fn get_stats(State(state): State<ApiState>) -> impl IntoResponse {
    let sync = state.registry.stats().await;
    let signal = state.hub.stats().await;

    Json(StatsResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_connections: sync.active_connections,
        active_rooms: sync.active_rooms,
        signal_connections: signal.signal_connections,
        signal_rooms: signal.signal_rooms,
    })
}
