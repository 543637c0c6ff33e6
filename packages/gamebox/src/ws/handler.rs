//! WebSocket Handler
//!
//! Game push channel connection handler.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::metrics::ServerMetrics;
use crate::registry::{Departure, SessionRegistry};

use super::protocol::{ClientMessage, ServerMessage};

/// Handle a game WebSocket connection
pub async fn handle_game_ws(
    socket: WebSocket,
    registry: Arc<SessionRegistry>,
    metrics: Arc<ServerMetrics>,
    send_capacity: usize,
) {
    // Unique ID for this connection (log correlation only)
    let connection_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %connection_id, "New game WebSocket connection");
    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending messages to the WebSocket
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(send_capacity);

    // Player bound to this socket by a Register message
    let mut registered_player: Option<String> = None;

    // Forward every session snapshot, whichever game it belongs to
    let mut state_rx = registry.hub().subscribe();
    debug!(
        conn_id = %connection_id,
        subscribers = registry.hub().subscriber_count(),
        "Subscribed to game state broadcasts"
    );
    let tx_state = tx.clone();
    let metrics_state = metrics.clone();
    let conn_state = connection_id.clone();
    let broadcast_task = async move {
        loop {
            match state_rx.recv().await {
                Ok(snapshot) => {
                    if tx_state
                        .send(ServerMessage::game_state(&snapshot))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // The next heartbeat carries the full state again
                    metrics_state.messages_dropped(n);
                    warn!(conn_id = %conn_state, "Game state broadcast lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    // Task to send messages to WebSocket
    let metrics_send = metrics.clone();
    let sender_task = async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            metrics_send.message_sent();
        }
    };

    // Task to handle incoming messages
    let tx_input = tx.clone();
    let metrics_input = metrics.clone();
    let conn_input = connection_id.clone();
    let registered = &mut registered_player;
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics_input.message_received();
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Register { player_id }) => {
                            debug!(conn_id = %conn_input, player_id = %player_id, "Player registered");
                            *registered = Some(player_id.clone());
                            if tx_input
                                .send(ServerMessage::Registered { player_id })
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(conn_id = %conn_input, "Ignoring malformed client message: {}", e);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Client closed connection");
                    break;
                }
                Err(e) => {
                    metrics_input.websocket_error();
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    };

    // Run all tasks
    tokio::select! {
        _ = broadcast_task => debug!("Broadcast task ended"),
        _ = sender_task => debug!("Sender task ended"),
        _ = input_task => debug!("Input task ended"),
    }

    if let Some(player_id) = registered_player {
        release_player(&registry, &metrics, &player_id).await;
    }

    metrics.connection_closed();
    info!(conn_id = %connection_id, "Game WebSocket connection closed");
}

/// Remove a disconnected player from every session it joined.
pub(crate) async fn release_player(
    registry: &SessionRegistry,
    metrics: &ServerMetrics,
    player_id: &str,
) -> Vec<(String, Departure)> {
    let departures = registry.disconnect(player_id).await;
    for (game_id, departure) in &departures {
        if *departure == Departure::SessionClosed {
            metrics.session_deleted();
        }
        info!(game_id = %game_id, player_id, ?departure, "Removed disconnected player");
    }
    departures
}
