use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::AppState;
use crate::error::{GameError, GameResult};
use crate::models::Session;
use crate::modes::imposter::RoundResult;
use crate::modes::{GameModeKind, RESET_ACTION};
use crate::registry::Departure;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    player_id: String,
    nickname: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameResponse {
    game_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    player_id: String,
    nickname: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveGameRequest {
    player_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    player_id: String,
    game_mode: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    player_id: String,
    action: String,
    #[serde(default)]
    details: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAck {
    success: bool,
    game_id: String,
}

impl GameAck {
    fn ok(game_id: String) -> Json<Self> {
        Json(Self {
            success: true,
            game_id,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateResponse {
    success: bool,
    game_id: String,
    state: Session,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    success: bool,
    game_id: String,
    action: String,
    details: Value,
    player_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResultResponse {
    success: bool,
    game_id: String,
    result: RoundResult,
}

fn require_player_id(player_id: &str, action: &'static str) -> GameResult<()> {
    if player_id.trim().is_empty() {
        return Err(GameError::InvalidPayload {
            action,
            reason: "playerId must not be empty".to_string(),
        });
    }
    Ok(())
}

pub async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> GameResult<Json<CreateGameResponse>> {
    require_player_id(&req.player_id, "create")?;

    let game_id = state
        .registry
        .create_session(&req.player_id, &req.nickname)
        .await;
    state.metrics.session_created();

    Ok(Json(CreateGameResponse { game_id }))
}

pub async fn join_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(req): Json<JoinGameRequest>,
) -> GameResult<Json<GameAck>> {
    require_player_id(&req.player_id, "join")?;

    state
        .registry
        .join_session(&game_id, &req.player_id, &req.nickname)
        .await?;

    Ok(GameAck::ok(game_id))
}

pub async fn leave_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(req): Json<LeaveGameRequest>,
) -> GameResult<Json<GameAck>> {
    require_player_id(&req.player_id, "leave")?;

    let departure = state
        .registry
        .leave_session(&game_id, &req.player_id)
        .await?;
    if departure == Departure::SessionClosed {
        state.metrics.session_deleted();
    }

    Ok(GameAck::ok(game_id))
}

pub async fn get_game_state(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> GameResult<Json<GameStateResponse>> {
    let session = state.registry.get_state(&game_id).await?;
    Ok(Json(GameStateResponse {
        success: true,
        game_id,
        state: session,
    }))
}

pub async fn start_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(req): Json<StartGameRequest>,
) -> GameResult<Json<GameAck>> {
    require_player_id(&req.player_id, "start")?;
    let mode: GameModeKind = req.game_mode.parse()?;

    state
        .registry
        .start_round(&game_id, &req.player_id, mode)
        .await?;
    state.metrics.round_started();

    Ok(GameAck::ok(game_id))
}

pub async fn game_action(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(req): Json<ActionRequest>,
) -> GameResult<Json<ActionResponse>> {
    require_player_id(&req.player_id, "action")?;

    if req.action == RESET_ACTION {
        state
            .registry
            .reset_mode(&game_id, &req.player_id)
            .await?;
    } else {
        state
            .registry
            .apply_action(&game_id, &req.player_id, &req.action, req.details.clone())
            .await?;
    }
    state.metrics.action_applied();

    Ok(Json(ActionResponse {
        success: true,
        game_id,
        action: req.action,
        details: req.details,
        player_id: req.player_id,
    }))
}

pub async fn get_round_result(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> GameResult<Json<RoundResultResponse>> {
    let result = state.registry.round_result(&game_id).await?;
    Ok(Json(RoundResultResponse {
        success: true,
        game_id,
        result,
    }))
}
