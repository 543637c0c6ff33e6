pub mod games;
pub mod health;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use games::{
    create_game, game_action, get_game_state, get_round_result, join_game, leave_game, start_game,
};
pub use health::{health_handler, health_live_handler, metrics_handler};
pub use websocket::game_websocket_handler;
