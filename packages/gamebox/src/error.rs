use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Errors raised by the session registry and the game modes.
///
/// All of them are local and final: nothing here is worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("game not found: {0}")]
    GameNotFound(String),

    #[error("only the host can {0}")]
    Forbidden(&'static str),

    #[error("invalid game state: {0}")]
    InvalidState(&'static str),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown game mode: {0}")]
    UnknownMode(String),

    #[error("invalid payload for '{action}': {reason}")]
    InvalidPayload { action: &'static str, reason: String },
}

impl GameError {
    pub fn status(&self) -> StatusCode {
        match self {
            GameError::GameNotFound(_) => StatusCode::NOT_FOUND,
            GameError::Forbidden(_) => StatusCode::FORBIDDEN,
            GameError::InvalidState(_) => StatusCode::CONFLICT,
            GameError::UnknownAction(_)
            | GameError::UnknownMode(_)
            | GameError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GameError::GameNotFound(_))
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.is_not_found() {
            tracing::debug!(error = %self, "Request rejected");
        } else {
            tracing::info!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type GameResult<T> = Result<T, GameError>;
