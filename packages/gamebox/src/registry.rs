//! Session Registry
//!
//! Owns every live session. All mutations go through a single lock, so each
//! operation runs to completion (including its broadcast) before the next one
//! starts, and the roster invariants hold between operations:
//!
//! - no duplicate player ids
//! - exactly one host whenever the roster is non-empty
//! - an empty session does not exist

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{GameError, GameResult};
use crate::hub::{BroadcastHub, Heartbeat};
use crate::models::{ModeState, Player, Session};
use crate::modes::imposter::RoundResult;
use crate::modes::{GameMode, GameModeKind, RoundAction};

const GAME_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
/// Collisions tolerated at one id length before ids grow by a character.
const GAME_ID_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub heartbeat_interval: Duration,
    pub game_id_length: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(1000),
            game_id_length: 6,
        }
    }
}

/// What happened to a session when a player left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// Player removed, session still has players.
    Left,
    /// The last player left; the session is gone.
    SessionClosed,
    /// The player was not in the session. Nothing changed except the push.
    NotPresent,
}

struct SessionEntry {
    session: Session,
    heartbeat: Heartbeat,
}

struct RegistryState {
    sessions: HashMap<String, SessionEntry>,
    rng: StdRng,
}

pub struct SessionRegistry {
    state: Arc<Mutex<RegistryState>>,
    hub: BroadcastHub,
    modes: HashMap<GameModeKind, Arc<dyn GameMode>>,
    settings: RegistrySettings,
}

impl SessionRegistry {
    pub fn new(
        hub: BroadcastHub,
        modes: Vec<Arc<dyn GameMode>>,
        settings: RegistrySettings,
    ) -> Self {
        Self::with_rng(hub, modes, settings, StdRng::from_os_rng())
    }

    pub fn with_rng(
        hub: BroadcastHub,
        modes: Vec<Arc<dyn GameMode>>,
        settings: RegistrySettings,
        rng: StdRng,
    ) -> Self {
        let modes = modes.into_iter().map(|m| (m.kind(), m)).collect();
        Self {
            state: Arc::new(Mutex::new(RegistryState {
                sessions: HashMap::new(),
                rng,
            })),
            hub,
            modes,
            settings,
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Create a session hosted by `host_id` and start its heartbeat.
    pub async fn create_session(&self, host_id: &str, host_nickname: &str) -> String {
        let mut state = self.state.lock().await;

        let mut length = self.settings.game_id_length;
        let game_id = 'search: loop {
            for _ in 0..GAME_ID_ATTEMPTS {
                let candidate = generate_game_id(&mut state.rng, length);
                if !state.sessions.contains_key(&candidate) {
                    break 'search candidate;
                }
            }
            length += 1;
            debug!(length, "Game id space crowded, lengthening ids");
        };

        let session = Session::new(
            game_id.clone(),
            host_id.to_string(),
            host_nickname.to_string(),
        );
        let heartbeat = self.spawn_heartbeat(&game_id);
        self.hub.publish(&session);
        state
            .sessions
            .insert(game_id.clone(), SessionEntry { session, heartbeat });

        info!(game_id = %game_id, host_id, "Session created");
        game_id
    }

    /// Add a player. Joining twice is a no-op (but still pushes the state).
    pub async fn join_session(
        &self,
        game_id: &str,
        player_id: &str,
        nickname: &str,
    ) -> GameResult<()> {
        let mut state = self.state.lock().await;
        let session = session_mut(&mut state, game_id)?;

        if session.players.insert(Player::new(player_id, nickname, false)) {
            info!(game_id, player_id, "Player joined");
        } else {
            debug!(game_id, player_id, "Player already in session");
        }
        self.hub.publish(session);
        Ok(())
    }

    /// Remove a player, handing the host role over or closing the session as needed.
    pub async fn leave_session(&self, game_id: &str, player_id: &str) -> GameResult<Departure> {
        let mut state = self.state.lock().await;
        if !state.sessions.contains_key(game_id) {
            return Err(GameError::GameNotFound(game_id.to_string()));
        }
        Ok(self.remove_player(&mut state, game_id, player_id))
    }

    /// Remove a player from every session it is part of (socket disconnect).
    pub async fn disconnect(&self, player_id: &str) -> Vec<(String, Departure)> {
        let mut state = self.state.lock().await;
        let game_ids: Vec<String> = state
            .sessions
            .iter()
            .filter(|(_, entry)| entry.session.players.contains(player_id))
            .map(|(id, _)| id.clone())
            .collect();

        let mut departures = Vec::with_capacity(game_ids.len());
        for game_id in game_ids {
            let departure = self.remove_player(&mut state, &game_id, player_id);
            departures.push((game_id, departure));
        }
        departures
    }

    pub async fn get_state(&self, game_id: &str) -> GameResult<Session> {
        let state = self.state.lock().await;
        state
            .sessions
            .get(game_id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))
    }

    /// Start a round of `mode`. Host only; replaces any round in progress.
    pub async fn start_round(
        &self,
        game_id: &str,
        caller_id: &str,
        mode: GameModeKind,
    ) -> GameResult<()> {
        let plugin = self.mode(mode)?;
        let mut state = self.state.lock().await;
        let RegistryState { sessions, rng } = &mut *state;
        let session = sessions
            .get_mut(game_id)
            .map(|entry| &mut entry.session)
            .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))?;

        let mode_state = plugin.start_round(session, caller_id, rng)?;
        session.mode_state = Some(mode_state);

        info!(game_id, mode = %mode, players = session.players.len(), "Round started");
        self.hub.publish(session);
        Ok(())
    }

    /// Apply a round action sent by name.
    ///
    /// The session and the round are checked before the action is parsed, so
    /// a missing game is `NotFound` and a missing round is `InvalidState`
    /// whatever the action says.
    pub async fn apply_action(
        &self,
        game_id: &str,
        caller_id: &str,
        action: &str,
        details: Value,
    ) -> GameResult<()> {
        let mut state = self.state.lock().await;
        let session = session_mut(&mut state, game_id)?;

        let kind = session
            .mode_state
            .as_ref()
            .map(ModeState::kind)
            .ok_or(GameError::InvalidState("no round in progress"))?;
        let action = RoundAction::parse(action, details)?;
        self.mode(kind)?
            .handle_action(session, &action, caller_id)?;

        debug!(game_id, caller_id, action = action.name(), "Action applied");
        self.hub.publish(session);
        Ok(())
    }

    /// Drop the round in progress, back to the lobby. Host only.
    pub async fn reset_mode(&self, game_id: &str, caller_id: &str) -> GameResult<()> {
        let mut state = self.state.lock().await;
        let session = session_mut(&mut state, game_id)?;

        session.require_host(caller_id, "reset the game")?;
        session.mode_state = None;

        info!(game_id, caller_id, "Game reset to lobby");
        self.hub.publish(session);
        Ok(())
    }

    /// Winner of the round whose votes have been revealed.
    pub async fn round_result(&self, game_id: &str) -> GameResult<RoundResult> {
        let state = self.state.lock().await;
        let session = state
            .sessions
            .get(game_id)
            .map(|entry| &entry.session)
            .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))?;

        match &session.mode_state {
            Some(ModeState::Imposter(round)) => round.result(),
            None => Err(GameError::InvalidState("no round in progress")),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Cancel every heartbeat. Sessions stay readable until the registry is dropped.
    pub async fn shutdown(&self) {
        let state = self.state.lock().await;
        for entry in state.sessions.values() {
            entry.heartbeat.cancel();
        }
        info!(sessions = state.sessions.len(), "Stopped all heartbeats");
    }

    fn mode(&self, kind: GameModeKind) -> GameResult<Arc<dyn GameMode>> {
        self.modes
            .get(&kind)
            .cloned()
            .ok_or_else(|| GameError::UnknownMode(kind.to_string()))
    }

    fn remove_player(
        &self,
        state: &mut RegistryState,
        game_id: &str,
        player_id: &str,
    ) -> Departure {
        let RegistryState { sessions, rng } = state;
        let Some(entry) = sessions.get_mut(game_id) else {
            return Departure::NotPresent;
        };
        let session = &mut entry.session;

        let Some(removed) = session.players.remove(player_id) else {
            self.hub.publish(session);
            return Departure::NotPresent;
        };

        if session.players.is_empty() {
            if let Some(entry) = sessions.remove(game_id) {
                entry.heartbeat.cancel();
            }
            info!(game_id, player_id, "Last player left, session closed");
            return Departure::SessionClosed;
        }

        if removed.is_host || session.players.host().is_none() {
            let index = rng.random_range(0..session.players.len());
            if let Some(new_host) = session.players.get_index_mut(index) {
                new_host.is_host = true;
                info!(game_id, new_host = %new_host.id, "Host reassigned");
            }
        }

        info!(game_id, player_id, "Player left");
        self.hub.publish(session);
        Departure::Left
    }

    fn spawn_heartbeat(&self, game_id: &str) -> Heartbeat {
        let state = Arc::downgrade(&self.state);
        let hub = self.hub.clone();
        let id = game_id.to_string();
        Heartbeat::spawn(
            game_id.to_string(),
            self.settings.heartbeat_interval,
            move || {
                let state = state.clone();
                let hub = hub.clone();
                let id = id.clone();
                async move {
                    let Some(state) = state.upgrade() else {
                        return false;
                    };
                    // Published under the lock so a beat cannot overtake a newer mutation
                    let guard = state.lock().await;
                    match guard.sessions.get(&id) {
                        Some(entry) if !entry.session.players.is_empty() => {
                            hub.publish(&entry.session);
                            true
                        }
                        _ => false,
                    }
                }
            },
        )
    }
}

fn session_mut<'a>(state: &'a mut RegistryState, game_id: &str) -> GameResult<&'a mut Session> {
    state
        .sessions
        .get_mut(game_id)
        .map(|entry| &mut entry.session)
        .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))
}

fn generate_game_id<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| GAME_ID_ALPHABET[rng.random_range(0..GAME_ID_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::SessionSnapshot;
    use crate::modes::imposter::{Phase, Winner};
    use crate::modes::ImposterMode;
    use crate::words::WordList;
    use serde_json::json;
    use tokio::sync::broadcast;

    fn registry(seed: u64) -> SessionRegistry {
        registry_with(seed, RegistrySettings::default(), 64)
    }

    fn registry_with(seed: u64, settings: RegistrySettings, capacity: usize) -> SessionRegistry {
        let hub = BroadcastHub::new(capacity);
        let imposter: Arc<dyn GameMode> = Arc::new(ImposterMode::new(Arc::new(WordList::builtin())));
        SessionRegistry::with_rng(hub, vec![imposter], settings, StdRng::seed_from_u64(seed))
    }

    async fn lobby(reg: &SessionRegistry, ids: &[&str]) -> String {
        let game_id = reg.create_session(ids[0], ids[0]).await;
        for id in &ids[1..] {
            reg.join_session(&game_id, id, id).await.unwrap();
        }
        game_id
    }

    fn assert_roster_invariants(session: &Session) {
        let ids: std::collections::HashSet<&String> = session.players.ids().collect();
        assert_eq!(ids.len(), session.players.len(), "duplicate player ids");
        if !session.players.is_empty() {
            assert_eq!(
                session.players.iter().filter(|p| p.is_host).count(),
                1,
                "exactly one host"
            );
        }
    }

    fn drain(rx: &mut broadcast::Receiver<SessionSnapshot>) -> Vec<SessionSnapshot> {
        let mut out = Vec::new();
        while let Ok(snap) = rx.try_recv() {
            out.push(snap);
        }
        out
    }

    async fn wants_to_vote(reg: &SessionRegistry, game_id: &str, caller: &str) -> GameResult<()> {
        reg.apply_action(game_id, caller, "wantsToVote", json!({})).await
    }

    #[tokio::test]
    async fn create_session_makes_caller_host() {
        let reg = registry(1);
        let mut rx = reg.hub().subscribe();

        let game_id = reg.create_session("p1", "Alice").await;
        assert_eq!(game_id.len(), 6);
        assert!(game_id.bytes().all(|b| GAME_ID_ALPHABET.contains(&b)));

        let session = reg.get_state(&game_id).await.unwrap();
        assert_eq!(session.players.len(), 1);
        assert!(session.is_host("p1"));
        assert!(session.mode_state.is_none());

        let pushed = drain(&mut rx);
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].game_id, game_id);
    }

    #[tokio::test]
    async fn game_ids_are_unique() {
        let reg = registry(2);
        let mut ids = std::collections::HashSet::new();
        for i in 0..200 {
            ids.insert(reg.create_session(&format!("p{i}"), "x").await);
        }
        assert_eq!(ids.len(), 200);
        assert_eq!(reg.session_count().await, 200);
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let reg = registry(3);
        let game_id = lobby(&reg, &["p1", "p2"]).await;
        reg.join_session(&game_id, "p2", "Bob again").await.unwrap();

        let session = reg.get_state(&game_id).await.unwrap();
        assert_eq!(session.players.len(), 2);
        assert_eq!(session.players.get("p2").unwrap().nickname, "p2");
        assert!(!session.is_host("p2"));
        assert_roster_invariants(&session);
    }

    #[tokio::test]
    async fn unknown_game_is_not_found() {
        let reg = registry(4);
        let missing = GameError::GameNotFound("nope".into());
        assert_eq!(reg.join_session("nope", "p1", "A").await, Err(missing.clone()));
        assert_eq!(reg.leave_session("nope", "p1").await, Err(missing.clone()));
        assert_eq!(reg.get_state("nope").await, Err(missing.clone()));
        assert_eq!(
            reg.start_round("nope", "p1", GameModeKind::Imposter).await,
            Err(missing.clone())
        );
        assert_eq!(reg.reset_mode("nope", "p1").await, Err(missing.clone()));
        assert_eq!(
            reg.apply_action("nope", "p1", "advance", json!({})).await,
            Err(missing.clone())
        );
        assert_eq!(reg.round_result("nope").await, Err(missing));
    }

    #[tokio::test]
    async fn host_leaving_hands_over_to_remaining_player() {
        for seed in 0..20 {
            let reg = registry(seed);
            let game_id = lobby(&reg, &["p1", "p2", "p3"]).await;

            assert_eq!(
                reg.leave_session(&game_id, "p1").await.unwrap(),
                Departure::Left
            );
            let session = reg.get_state(&game_id).await.unwrap();
            assert_roster_invariants(&session);
            assert!(!session.players.contains("p1"));
            let host = session.players.host().unwrap();
            assert!(host.id == "p2" || host.id == "p3");
        }
    }

    #[tokio::test]
    async fn non_host_leaving_keeps_host() {
        let reg = registry(5);
        let game_id = lobby(&reg, &["p1", "p2", "p3"]).await;
        reg.leave_session(&game_id, "p2").await.unwrap();
        let session = reg.get_state(&game_id).await.unwrap();
        assert!(session.is_host("p1"));
        assert_roster_invariants(&session);
    }

    #[tokio::test]
    async fn last_player_leaving_closes_session() {
        let reg = registry(6);
        let mut rx = reg.hub().subscribe();
        let game_id = lobby(&reg, &["p1"]).await;
        drain(&mut rx);

        assert_eq!(
            reg.leave_session(&game_id, "p1").await.unwrap(),
            Departure::SessionClosed
        );
        assert!(drain(&mut rx).is_empty(), "no push for a closed session");
        assert!(reg.get_state(&game_id).await.unwrap_err().is_not_found());
        assert!(reg.join_session(&game_id, "p2", "B").await.is_err());
        assert_eq!(reg.session_count().await, 0);
    }

    #[tokio::test]
    async fn leaving_without_being_present_changes_nothing() {
        let reg = registry(7);
        let game_id = lobby(&reg, &["p1"]).await;
        assert_eq!(
            reg.leave_session(&game_id, "ghost").await.unwrap(),
            Departure::NotPresent
        );
        assert_eq!(reg.get_state(&game_id).await.unwrap().players.len(), 1);
    }

    #[tokio::test]
    async fn join_leave_sequences_keep_invariants() {
        let reg = registry(8);
        let game_id = lobby(&reg, &["p0"]).await;
        let ops: &[(bool, &str)] = &[
            (true, "p1"),
            (true, "p2"),
            (true, "p1"),
            (false, "p0"),
            (true, "p3"),
            (false, "p2"),
            (false, "p9"),
            (true, "p0"),
            (false, "p1"),
            (false, "p3"),
        ];
        for (join, id) in ops {
            if *join {
                reg.join_session(&game_id, id, id).await.unwrap();
            } else {
                reg.leave_session(&game_id, id).await.unwrap();
            }
            assert_roster_invariants(&reg.get_state(&game_id).await.unwrap());
        }
        let session = reg.get_state(&game_id).await.unwrap();
        let ids: Vec<&String> = session.players.ids().collect();
        assert_eq!(ids, ["p0"]);
        assert!(session.is_host("p0"));
    }

    #[tokio::test]
    async fn disconnect_removes_player_everywhere() {
        let reg = registry(9);
        let g1 = lobby(&reg, &["p1", "p2"]).await;
        let g2 = lobby(&reg, &["p2"]).await;
        let g3 = lobby(&reg, &["p3"]).await;

        let departures: HashMap<String, Departure> =
            reg.disconnect("p2").await.into_iter().collect();
        assert_eq!(departures.len(), 2);
        assert_eq!(departures[&g1], Departure::Left);
        assert_eq!(departures[&g2], Departure::SessionClosed);

        assert!(!reg.get_state(&g1).await.unwrap().players.contains("p2"));
        assert!(reg.get_state(&g2).await.is_err());
        assert!(reg.get_state(&g3).await.is_ok());
    }

    #[tokio::test]
    async fn start_round_requires_host_and_member() {
        let reg = registry(10);
        let game_id = lobby(&reg, &["p1", "p2"]).await;

        assert_eq!(
            reg.start_round(&game_id, "p2", GameModeKind::Imposter).await,
            Err(GameError::Forbidden("start the game"))
        );
        assert_eq!(
            reg.start_round(&game_id, "ghost", GameModeKind::Imposter).await,
            Err(GameError::Forbidden("start the game"))
        );
        assert!(reg.get_state(&game_id).await.unwrap().mode_state.is_none());
    }

    #[tokio::test]
    async fn actions_without_round_are_invalid() {
        let reg = registry(11);
        let game_id = lobby(&reg, &["p1"]).await;
        assert_eq!(
            wants_to_vote(&reg, &game_id, "p1").await,
            Err(GameError::InvalidState("no round in progress"))
        );
        // The round check comes before the action is looked at
        assert_eq!(
            reg.apply_action(&game_id, "p1", "advance", json!({})).await,
            Err(GameError::InvalidState("no round in progress"))
        );
        assert!(matches!(
            reg.round_result(&game_id).await,
            Err(GameError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn full_imposter_round() {
        let reg = registry(12);
        let mut rx = reg.hub().subscribe();
        let game_id = lobby(&reg, &["P1", "P2", "P3"]).await;

        reg.start_round(&game_id, "P1", GameModeKind::Imposter)
            .await
            .unwrap();
        let session = reg.get_state(&game_id).await.unwrap();
        let Some(ModeState::Imposter(round)) = &session.mode_state else {
            panic!("expected an imposter round");
        };
        let active: Vec<&str> = round.active_players.iter().map(String::as_str).collect();
        assert_eq!(active, ["P1", "P2", "P3"]);
        assert!(["P1", "P2", "P3"].contains(&round.imposter.as_str()));
        let imposter = round.imposter.clone();

        for p in ["P1", "P2", "P3"] {
            wants_to_vote(&reg, &game_id, p).await.unwrap();
        }
        let session = reg.get_state(&game_id).await.unwrap();
        let Some(ModeState::Imposter(round)) = &session.mode_state else {
            panic!("expected an imposter round");
        };
        assert!(matches!(&round.phase, Phase::Voting { votes } if votes.is_empty()));

        for p in ["P1", "P2", "P3"] {
            reg.apply_action(&game_id, p, "vote", json!({ "target": imposter }))
                .await
                .unwrap();
        }
        reg.apply_action(&game_id, "P2", "endVoting", json!({}))
            .await
            .unwrap();

        let session = reg.get_state(&game_id).await.unwrap();
        let Some(ModeState::Imposter(round)) = &session.mode_state else {
            panic!("expected an imposter round");
        };
        assert!(matches!(&round.phase, Phase::Reveal { votes } if votes.len() == 3));

        let result = reg.round_result(&game_id).await.unwrap();
        assert_eq!(result.winner, Winner::Crew);
        assert_eq!(result.imposter_votes, 3);

        // create + 2 joins + start + 3 toggles + 3 votes + end
        assert_eq!(drain(&mut rx).len(), 11);
    }

    #[tokio::test]
    async fn reset_clears_round_for_host_only() {
        let reg = registry(13);
        let game_id = lobby(&reg, &["p1", "p2"]).await;
        reg.start_round(&game_id, "p1", GameModeKind::Imposter)
            .await
            .unwrap();
        wants_to_vote(&reg, &game_id, "p1").await.unwrap();

        for caller in ["p2", "ghost"] {
            assert_eq!(
                reg.reset_mode(&game_id, caller).await,
                Err(GameError::Forbidden("reset the game"))
            );
        }
        let before = reg.get_state(&game_id).await.unwrap();
        assert!(before.mode_state.is_some());

        reg.reset_mode(&game_id, "p1").await.unwrap();
        assert!(reg.get_state(&game_id).await.unwrap().mode_state.is_none());
    }

    #[tokio::test]
    async fn reset_works_in_every_phase() {
        let reg = registry(14);
        let game_id = lobby(&reg, &["p1"]).await;
        let steps: [&[&str]; 3] = [&[], &["wantsToVote"], &["wantsToVote", "endVoting"]];
        for step in steps {
            reg.start_round(&game_id, "p1", GameModeKind::Imposter)
                .await
                .unwrap();
            for action in step {
                reg.apply_action(&game_id, "p1", action, json!({}))
                    .await
                    .unwrap();
            }
            reg.reset_mode(&game_id, "p1").await.unwrap();
            assert!(reg.get_state(&game_id).await.unwrap().mode_state.is_none());
        }
    }

    #[tokio::test]
    async fn snapshot_json_shape() {
        let reg = registry(15);
        let game_id = lobby(&reg, &["p1", "p2"]).await;
        reg.start_round(&game_id, "p1", GameModeKind::Imposter)
            .await
            .unwrap();
        let json = serde_json::to_value(reg.get_state(&game_id).await.unwrap()).unwrap();
        assert_eq!(json["gameId"], json!(game_id));
        assert_eq!(json["modeState"]["mode"], "imposter");
        assert_eq!(json["modeState"]["phase"], json!({ "phase": "discussion", "wantsToVote": [] }));
    }

    #[tokio::test]
    async fn unknown_action_during_round_is_rejected() {
        let reg = registry(18);
        let game_id = lobby(&reg, &["p1", "p2"]).await;
        reg.start_round(&game_id, "p1", GameModeKind::Imposter)
            .await
            .unwrap();
        let before = reg.get_state(&game_id).await.unwrap();

        assert_eq!(
            reg.apply_action(&game_id, "p1", "advance", json!({})).await,
            Err(GameError::UnknownAction("advance".into()))
        );
        assert!(matches!(
            reg.apply_action(&game_id, "p1", "vote", json!({ "who": "p2" })).await,
            Err(GameError::InvalidPayload { action: "vote", .. })
        ));
        assert_eq!(reg.get_state(&game_id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn short_game_ids_grow_when_exhausted() {
        let settings = RegistrySettings {
            game_id_length: 1,
            ..RegistrySettings::default()
        };
        let reg = registry_with(19, settings, 64);

        // Only 36 one-character ids exist
        let mut ids = std::collections::HashSet::new();
        for i in 0..50 {
            ids.insert(reg.create_session(&format!("p{i}"), "x").await);
        }
        assert_eq!(ids.len(), 50);
        assert_eq!(reg.session_count().await, 50);
        assert!(ids.iter().all(|id| !id.is_empty()));
        assert!(ids.iter().any(|id| id.len() > 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn heartbeat_never_pushes_stale_state() {
        let settings = RegistrySettings {
            heartbeat_interval: Duration::from_millis(1),
            ..RegistrySettings::default()
        };
        let reg = Arc::new(registry_with(20, settings, 8192));
        let mut rx = reg.hub().subscribe();
        let game_id = reg.create_session("p0", "p0").await;

        for i in 1..200 {
            reg.join_session(&game_id, &format!("p{i}"), "x")
                .await
                .unwrap();
            tokio::task::yield_now().await;
        }
        reg.shutdown().await;

        // Pushes arrive in lock order, so the roster never shrinks between frames
        let mut last = 0;
        for snap in drain(&mut rx) {
            assert!(snap.players.len() >= last, "stale frame after a join");
            last = snap.players.len();
        }
        assert_eq!(last, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_runs_while_session_lives() {
        let reg = registry(16);
        let mut rx = reg.hub().subscribe();
        let game_id = reg.create_session("p1", "Alice").await;
        assert_eq!(rx.recv().await.unwrap().game_id, game_id);

        for _ in 0..2 {
            let snap = tokio::time::timeout(Duration::from_millis(1100), rx.recv())
                .await
                .expect("heartbeat push")
                .unwrap();
            assert_eq!(snap.game_id, game_id);
        }

        reg.leave_session(&game_id, "p1").await.unwrap();
        let quiet = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(quiet.is_err(), "heartbeat must stop with the session");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_heartbeats() {
        let reg = registry(17);
        let mut rx = reg.hub().subscribe();
        let _game_id = reg.create_session("p1", "Alice").await;
        drain(&mut rx);

        reg.shutdown().await;
        let quiet = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(quiet.is_err());
    }
}
