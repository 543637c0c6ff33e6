//! Imposter mode
//!
//! Everybody but the imposter gets the same word; the imposter only gets a
//! related hint. Players talk, signal when they are ready to vote, vote for
//! whoever they think is the imposter, and the votes are revealed.
//!
//! Phases only move forward: `Discussion -> Voting -> Reveal`. `Scoring` is
//! part of the wire format but no action produces it yet.

use indexmap::{IndexMap, IndexSet};
use rand::RngCore;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{GameMode, GameModeKind, RoundAction};
use crate::error::{GameError, GameResult};
use crate::models::{ModeState, Session};
use crate::words::WordList;

/// Voter id -> vote target. A voter may be present without a target.
pub type Votes = IndexMap<String, Option<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    ImposterWin,
    ImposterClose,
    CrewmateWin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum Phase {
    Discussion {
        #[serde(rename = "wantsToVote")]
        wants_to_vote: IndexSet<String>,
    },
    Voting {
        votes: Votes,
    },
    Reveal {
        votes: Votes,
    },
    Scoring {
        outcome: Outcome,
    },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Discussion { .. } => "discussion",
            Phase::Voting { .. } => "voting",
            Phase::Reveal { .. } => "reveal",
            Phase::Scoring { .. } => "scoring",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImposterRound {
    pub phase: Phase,
    /// Roster at the moment the round started. Quorum checks use this, not the live roster.
    pub active_players: IndexSet<String>,
    pub word: String,
    pub hint: String,
    pub imposter: String,
    pub beginner: String,
}

impl ImposterRound {
    /// Toggle the player's readiness to vote. Moves to `Voting` once every
    /// active player is ready. Ignored outside `Discussion` and for players
    /// that were not part of the round when it started.
    pub fn toggle_wants_to_vote(&mut self, player_id: &str) {
        let Phase::Discussion { wants_to_vote } = &mut self.phase else {
            debug!(player_id, phase = self.phase.name(), "wantsToVote ignored");
            return;
        };
        if !self.active_players.contains(player_id) {
            debug!(player_id, "wantsToVote from a player outside the round ignored");
            return;
        }

        if !wants_to_vote.shift_remove(player_id) {
            wants_to_vote.insert(player_id.to_string());
        }

        if wants_to_vote.len() == self.active_players.len() {
            debug!("All active players want to vote, starting vote");
            self.phase = Phase::Voting {
                votes: Votes::new(),
            };
        }
    }

    /// Record or overwrite the caller's vote. Ignored outside `Voting`.
    pub fn record_vote(&mut self, voter_id: &str, target: &str) {
        let Phase::Voting { votes } = &mut self.phase else {
            debug!(voter_id, phase = self.phase.name(), "vote ignored");
            return;
        };
        votes.insert(voter_id.to_string(), Some(target.to_string()));
    }

    /// Freeze the votes and move to `Reveal`. Ignored outside `Voting`.
    pub fn end_voting(&mut self) {
        let Phase::Voting { votes } = &mut self.phase else {
            debug!(phase = self.phase.name(), "endVoting ignored");
            return;
        };
        let votes = std::mem::take(votes);
        self.phase = Phase::Reveal { votes };
    }

    /// Result of the round, available once the votes are revealed.
    pub fn result(&self) -> GameResult<RoundResult> {
        match &self.phase {
            Phase::Reveal { votes } => Ok(determine_winner(votes, &self.imposter)),
            _ => Err(GameError::InvalidState("votes have not been revealed yet")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Crew,
    Imposter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub winner: Winner,
    pub imposter: String,
    pub imposter_votes: usize,
    /// Target -> number of votes received, in first-vote order.
    pub tally: IndexMap<String, usize>,
}

/// The crew wins only if the imposter got strictly more votes than any other
/// single target. Ties, and a round where nobody voted, go to the imposter.
pub fn determine_winner(votes: &Votes, imposter: &str) -> RoundResult {
    let mut tally: IndexMap<String, usize> = IndexMap::new();
    for target in votes.values().flatten() {
        *tally.entry(target.clone()).or_insert(0) += 1;
    }

    let imposter_votes = tally.get(imposter).copied().unwrap_or(0);
    let most_for_others = tally
        .iter()
        .filter(|(target, _)| target.as_str() != imposter)
        .map(|(_, count)| *count)
        .max()
        .unwrap_or(0);

    let winner = if imposter_votes > most_for_others {
        Winner::Crew
    } else {
        Winner::Imposter
    };

    RoundResult {
        winner,
        imposter: imposter.to_string(),
        imposter_votes,
        tally,
    }
}

pub struct ImposterMode {
    words: Arc<WordList>,
}

impl ImposterMode {
    pub fn new(words: Arc<WordList>) -> Self {
        Self { words }
    }
}

impl GameMode for ImposterMode {
    fn kind(&self) -> GameModeKind {
        GameModeKind::Imposter
    }

    fn start_round(
        &self,
        session: &Session,
        caller_id: &str,
        rng: &mut dyn RngCore,
    ) -> GameResult<ModeState> {
        session.require_host(caller_id, "start the game")?;

        let roster: Vec<&String> = session.players.ids().collect();
        // Imposter and beginner are drawn independently and may be the same player.
        let (Some(imposter), Some(beginner)) =
            (roster.choose(&mut *rng), roster.choose(&mut *rng))
        else {
            return Err(GameError::InvalidState(
                "cannot start a round without players",
            ));
        };
        let pair = self.words.choose(&mut *rng);

        Ok(ModeState::Imposter(ImposterRound {
            phase: Phase::Discussion {
                wants_to_vote: IndexSet::new(),
            },
            active_players: roster.iter().map(|id| id.to_string()).collect(),
            word: pair.word.clone(),
            hint: pair.hint.clone(),
            imposter: imposter.to_string(),
            beginner: beginner.to_string(),
        }))
    }

    fn handle_action(
        &self,
        session: &mut Session,
        action: &RoundAction,
        caller_id: &str,
    ) -> GameResult<()> {
        let Some(ModeState::Imposter(round)) = session.mode_state.as_mut() else {
            return Err(GameError::InvalidState("no imposter round in progress"));
        };

        match action {
            RoundAction::WantsToVote => round.toggle_wants_to_vote(caller_id),
            RoundAction::Vote { target } => round.record_vote(caller_id, target),
            // Any player may end the vote; only start and reset are host-gated.
            RoundAction::EndVoting => round.end_voting(),
        }
        Ok(())
    }
}
