//! WebSocket Protocol Types
//!
//! Message types for the push channel.

use serde::{Deserialize, Serialize};

use crate::models::Session;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Bind a player id to this socket. When the socket closes, the player
    /// leaves every session it is in.
    Register { player_id: String },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full state of one session. Sent for every session; clients filter by `game_id`.
    GameState { game_id: String, state: Session },
    Registered { player_id: String },
}

impl ServerMessage {
    pub fn game_state(session: &Session) -> Self {
        ServerMessage::GameState {
            game_id: session.game_id.clone(),
            state: session.clone(),
        }
    }
}
