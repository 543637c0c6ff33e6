//! Push channel
//!
//! One WebSocket per client. Every session snapshot published on the hub is
//! forwarded to every socket; a socket may register a player id so the player
//! is removed from its sessions when the socket goes away.

mod handler;
mod protocol;

pub use handler::handle_game_ws;
