use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GameError, GameResult};
use crate::modes::GameModeKind;
use crate::modes::imposter::ImposterRound;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub nickname: String,
    pub is_host: bool,
    pub score: i64,
}

impl Player {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>, is_host: bool) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            is_host,
            score: 0,
        }
    }
}

/// Players of a session, in join order, keyed by player id.
///
/// Serialized as a plain array so clients see the ordered sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster(IndexMap<String, Player>);

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.0.contains_key(player_id)
    }

    pub fn get(&self, player_id: &str) -> Option<&Player> {
        self.0.get(player_id)
    }

    pub fn get_index_mut(&mut self, index: usize) -> Option<&mut Player> {
        self.0.get_index_mut(index).map(|(_, p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.0.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Append a player. Returns false (and leaves the roster untouched) if the id is taken.
    pub fn insert(&mut self, player: Player) -> bool {
        if self.0.contains_key(&player.id) {
            return false;
        }
        self.0.insert(player.id.clone(), player);
        true
    }

    /// Remove a player, keeping the order of the others.
    pub fn remove(&mut self, player_id: &str) -> Option<Player> {
        self.0.shift_remove(player_id)
    }

    pub fn host(&self) -> Option<&Player> {
        self.0.values().find(|p| p.is_host)
    }
}

impl FromIterator<Player> for Roster {
    fn from_iter<I: IntoIterator<Item = Player>>(iter: I) -> Self {
        let mut roster = Roster::new();
        for player in iter {
            roster.insert(player);
        }
        roster
    }
}

impl Serialize for Roster {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.values())
    }
}

impl<'de> Deserialize<'de> for Roster {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let players = Vec::<Player>::deserialize(deserializer)?;
        Ok(players.into_iter().collect())
    }
}

/// Mode-specific state of the round in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ModeState {
    Imposter(ImposterRound),
}

impl ModeState {
    pub fn kind(&self) -> GameModeKind {
        match self {
            ModeState::Imposter(_) => GameModeKind::Imposter,
        }
    }
}

/// One game room: its roster and the optional round in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub game_id: String,
    pub players: Roster,
    pub mode_state: Option<ModeState>,
}

impl Session {
    pub fn new(game_id: String, host_id: String, host_nickname: String) -> Self {
        let mut players = Roster::new();
        players.insert(Player::new(host_id, host_nickname, true));
        Self {
            game_id,
            players,
            mode_state: None,
        }
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.players.get(player_id).is_some_and(|p| p.is_host)
    }

    /// Fails with `Forbidden` unless `player_id` is the host. Callers who
    /// are not in the session at all are refused the same way.
    pub fn require_host(&self, player_id: &str, what: &'static str) -> GameResult<()> {
        if self.is_host(player_id) {
            Ok(())
        } else {
            Err(GameError::Forbidden(what))
        }
    }
}
