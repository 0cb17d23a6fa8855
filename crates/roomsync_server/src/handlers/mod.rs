pub mod api;
pub mod signal;
pub mod ws;

pub use api::api_routes;
pub use signal::signal_handler;
pub use ws::{ws_handler, ws_room_handler};

use crate::config::Config;
use crate::signaling::SignalHub;
use crate::sync::RoomRegistry;
use axum::{Router, http::Method, routing::get};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the full application router.
pub fn router(config: Arc<Config>, registry: Arc<RoomRegistry>, hub: Arc<SignalHub>) -> Router {
    let ws_state = ws::WsState {
        registry: registry.clone(),
        config: config.clone(),
    };
    let signal_state = signal::SignalState {
        hub: hub.clone(),
        config,
    };
    let api_state = api::ApiState { registry, hub };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_origin(Any);

    Router::new()
        // Health check
        .route("/", get(|| async { "Roomsync Server" }))
        .route("/health", get(|| async { "OK" }))
        // Document sync endpoints
        .route("/yjs", get(ws_handler).with_state(ws_state.clone()))
        .route("/yjs/{room}", get(ws_room_handler).with_state(ws_state))
        // Signaling relay
        .route("/signal", get(signal_handler).with_state(signal_state))
        .nest("/api", api_routes(api_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
