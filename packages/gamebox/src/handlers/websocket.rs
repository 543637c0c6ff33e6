use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Game push channel - one connection receives every session's updates
pub async fn game_websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let registry = state.registry.clone();
    let metrics = state.metrics.clone();
    let send_capacity = state.config.websocket.send_channel_capacity;

    ws.on_upgrade(move |socket| ws::handle_game_ws(socket, registry, metrics, send_capacity))
}
