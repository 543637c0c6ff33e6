//! Game modes
//!
//! A mode owns the state of a round: it builds that state when the host starts
//! a round and mutates it in response to player actions. Sessions know nothing
//! about the rules; they only hold whatever `ModeState` the mode produced.

pub mod imposter;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GameError, GameResult};
use crate::models::{ModeState, Session};

pub use imposter::ImposterMode;

/// The closed set of modes a host can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameModeKind {
    Imposter,
}

impl GameModeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameModeKind::Imposter => "imposter",
        }
    }
}

impl fmt::Display for GameModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameModeKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imposter" => Ok(GameModeKind::Imposter),
            other => Err(GameError::UnknownMode(other.to_string())),
        }
    }
}

/// Host-only action: drop the round and go back to the lobby. Handled by
/// the registry itself, never by a mode.
pub const RESET_ACTION: &str = "reset";

/// An action handled by the mode of the round in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundAction {
    WantsToVote,
    Vote { target: String },
    EndVoting,
}

#[derive(Debug, Deserialize)]
struct VotePayload {
    target: String,
}

impl RoundAction {
    /// Turn the wire-level `(action, details)` pair into a typed action.
    ///
    /// Unknown action names fail with `UnknownAction`, known ones with a
    /// payload of the wrong shape fail with `InvalidPayload`.
    pub fn parse(action: &str, details: serde_json::Value) -> GameResult<Self> {
        match action {
            "wantsToVote" => Ok(RoundAction::WantsToVote),
            "vote" => {
                let payload: VotePayload =
                    serde_json::from_value(details).map_err(|e| GameError::InvalidPayload {
                        action: "vote",
                        reason: e.to_string(),
                    })?;
                Ok(RoundAction::Vote {
                    target: payload.target,
                })
            }
            "endVoting" => Ok(RoundAction::EndVoting),
            other => Err(GameError::UnknownAction(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RoundAction::WantsToVote => "wantsToVote",
            RoundAction::Vote { .. } => "vote",
            RoundAction::EndVoting => "endVoting",
        }
    }
}

/// One implementation per game mode.
///
/// Both methods run while the registry holds the session exclusively, so they
/// must not block or await.
pub trait GameMode: Send + Sync {
    fn kind(&self) -> GameModeKind;

    /// Build the initial state of a new round. Host only.
    fn start_round(
        &self,
        session: &Session,
        caller_id: &str,
        rng: &mut dyn RngCore,
    ) -> GameResult<ModeState>;

    /// Apply a player action to the round in progress.
    ///
    /// Fails with `InvalidState` when the session has no round of this mode.
    fn handle_action(
        &self,
        session: &mut Session,
        action: &RoundAction,
        caller_id: &str,
    ) -> GameResult<()>;
}
