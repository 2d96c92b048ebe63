//! PvP match engine contract.
//!
//! The match engine owns game rules, pots, and refunds; the engine only
//! creates matches, polls state, submits moves, and cancels on timeout.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use townforge_types::{AgentId, GameType, MatchId, ReasonCode};

use crate::error::ServiceError;

/// Request to create a match.
#[derive(Debug, Clone)]
pub struct MatchRequest {
    /// The challenging agent.
    pub agent_id: AgentId,
    /// The chosen opponent.
    pub opponent_id: AgentId,
    /// Game variant.
    pub game_type: GameType,
    /// Wager per side in $ARENA.
    pub wager_amount: i64,
    /// Skip opening a prediction market for this match.
    pub skip_prediction_market: bool,
}

/// Match lifecycle as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// Moves are being exchanged.
    InProgress,
    /// Resolved with a winner (or draw).
    Complete,
    /// Cancelled; wagers refunded.
    Cancelled,
}

/// Snapshot of a match.
#[derive(Debug, Clone)]
pub struct MatchState {
    /// Match identifier.
    pub id: MatchId,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Whose turn it is, while in progress.
    pub active_agent: Option<AgentId>,
    /// Moves the engine will currently accept for the active agent.
    pub valid_actions: Vec<String>,
    /// The winner, once complete.
    pub winner: Option<AgentId>,
    /// Current pot in $ARENA.
    pub pot: i64,
}

/// Contract for the PvP match collaborator.
#[async_trait]
pub trait ArenaService: Send + Sync {
    /// Create a match; the engine escrows both wagers.
    async fn create_match(&self, request: MatchRequest) -> Result<MatchState, ServiceError>;

    /// Poll the current match state.
    async fn get_match_state(&self, id: MatchId) -> Result<MatchState, ServiceError>;

    /// Submit a move for the agent; rejected moves surface
    /// [`ServiceError::MoveRejected`] without advancing the match.
    async fn submit_move(
        &self,
        id: MatchId,
        agent_id: AgentId,
        action: &str,
    ) -> Result<MatchState, ServiceError>;

    /// Cancel a running match, refunding both wagers.
    async fn cancel_match(&self, id: MatchId, agent_id: AgentId) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// In-memory stub
// ---------------------------------------------------------------------------

/// Script entry controlling how the stub responds to one submitted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedMove {
    /// Accept the move and keep the match running.
    Accept,
    /// Accept the move and finish the match with the challenger winning.
    AcceptAndWin,
    /// Accept the move and finish the match with the challenger losing.
    AcceptAndLose,
    /// Reject the move (illegal for the current street).
    Reject,
}

#[derive(Debug)]
struct StubMatch {
    state: MatchState,
    challenger: AgentId,
    opponent: AgentId,
    script: Vec<ScriptedMove>,
    cursor: usize,
    moves_seen: Vec<String>,
}

/// Scripted match engine stub.
///
/// Each created match replays the configured script one entry per
/// accepted `submit_move`. An exhausted script keeps accepting moves
/// without ending the match, which is how timeout tests force the
/// turbo-loop cap.
#[derive(Debug, Default)]
pub struct StubArena {
    script: Mutex<Vec<ScriptedMove>>,
    matches: Mutex<BTreeMap<MatchId, StubMatch>>,
    fail_create: Mutex<bool>,
    cancelled: Mutex<Vec<MatchId>>,
}

impl StubArena {
    /// Create a stub whose matches follow the given move script.
    pub fn with_script(script: Vec<ScriptedMove>) -> Self {
        Self {
            script: Mutex::new(script),
            ..Self::default()
        }
    }

    /// Make `create_match` fail once.
    pub fn fail_next_create(&self) {
        if let Ok(mut flag) = self.fail_create.lock() {
            *flag = true;
        }
    }

    /// Matches cancelled so far (test assertion).
    pub fn cancelled(&self) -> Vec<MatchId> {
        self.cancelled.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// All moves accepted for the given match (test assertion).
    pub fn moves_seen(&self, id: MatchId) -> Vec<String> {
        self.matches
            .lock()
            .ok()
            .and_then(|m| m.get(&id).map(|s| s.moves_seen.clone()))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArenaService for StubArena {
    async fn create_match(&self, request: MatchRequest) -> Result<MatchState, ServiceError> {
        {
            let mut flag = self
                .fail_create
                .lock()
                .map_err(|_| ServiceError::downstream("arena stub poisoned"))?;
            if *flag {
                *flag = false;
                return Err(ServiceError::Rejected {
                    code: ReasonCode::MatchCreateFailed,
                    message: String::from("engine refused the match"),
                });
            }
        }
        let id = MatchId::new();
        let state = MatchState {
            id,
            status: MatchStatus::InProgress,
            active_agent: Some(request.agent_id),
            valid_actions: vec![
                String::from("all-in"),
                String::from("call"),
                String::from("check"),
                String::from("raise"),
                String::from("fold"),
            ],
            winner: None,
            pot: request.wager_amount.saturating_mul(2),
        };
        let script = self.script.lock().map(|s| s.clone()).unwrap_or_default();
        let mut matches = self
            .matches
            .lock()
            .map_err(|_| ServiceError::downstream("arena stub poisoned"))?;
        matches.insert(
            id,
            StubMatch {
                state: state.clone(),
                challenger: request.agent_id,
                opponent: request.opponent_id,
                script,
                cursor: 0,
                moves_seen: Vec::new(),
            },
        );
        Ok(state)
    }

    async fn get_match_state(&self, id: MatchId) -> Result<MatchState, ServiceError> {
        let matches = self
            .matches
            .lock()
            .map_err(|_| ServiceError::downstream("arena stub poisoned"))?;
        matches
            .get(&id)
            .map(|m| m.state.clone())
            .ok_or_else(|| ServiceError::not_found("match"))
    }

    async fn submit_move(
        &self,
        id: MatchId,
        agent_id: AgentId,
        action: &str,
    ) -> Result<MatchState, ServiceError> {
        let mut matches = self
            .matches
            .lock()
            .map_err(|_| ServiceError::downstream("arena stub poisoned"))?;
        let entry = matches
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found("match"))?;
        let step = entry.script.get(entry.cursor).copied().unwrap_or(ScriptedMove::Accept);
        match step {
            ScriptedMove::Reject => {
                entry.cursor = entry.cursor.saturating_add(1);
                Err(ServiceError::MoveRejected {
                    message: format!("{action} is not legal here"),
                })
            }
            ScriptedMove::Accept => {
                entry.cursor = entry.cursor.saturating_add(1);
                entry.moves_seen.push(action.to_owned());
                entry.state.active_agent = Some(agent_id);
                Ok(entry.state.clone())
            }
            ScriptedMove::AcceptAndWin | ScriptedMove::AcceptAndLose => {
                entry.cursor = entry.cursor.saturating_add(1);
                entry.moves_seen.push(action.to_owned());
                entry.state.status = MatchStatus::Complete;
                entry.state.winner = Some(if matches!(step, ScriptedMove::AcceptAndWin) {
                    entry.challenger
                } else {
                    entry.opponent
                });
                entry.state.active_agent = None;
                Ok(entry.state.clone())
            }
        }
    }

    async fn cancel_match(&self, id: MatchId, agent_id: AgentId) -> Result<(), ServiceError> {
        let _ = agent_id;
        let mut matches = self
            .matches
            .lock()
            .map_err(|_| ServiceError::downstream("arena stub poisoned"))?;
        let entry = matches
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found("match"))?;
        entry.state.status = MatchStatus::Cancelled;
        drop(matches);
        if let Ok(mut cancelled) = self.cancelled.lock() {
            cancelled.push(id);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(challenger: AgentId, opponent: AgentId) -> MatchRequest {
        MatchRequest {
            agent_id: challenger,
            opponent_id: opponent,
            game_type: GameType::Poker,
            wager_amount: 25,
            skip_prediction_market: true,
        }
    }

    #[tokio::test]
    async fn scripted_win_resolves_match() {
        let challenger = AgentId::new();
        let opponent = AgentId::new();
        let arena = StubArena::with_script(vec![ScriptedMove::Accept, ScriptedMove::AcceptAndWin]);

        let state = arena.create_match(request(challenger, opponent)).await.unwrap();
        let s1 = arena.submit_move(state.id, challenger, "all-in").await.unwrap();
        assert_eq!(s1.status, MatchStatus::InProgress);
        let s2 = arena.submit_move(state.id, challenger, "call").await.unwrap();
        assert_eq!(s2.status, MatchStatus::Complete);
        assert_eq!(s2.winner, Some(challenger));
    }

    #[tokio::test]
    async fn rejected_move_does_not_advance() {
        let challenger = AgentId::new();
        let opponent = AgentId::new();
        let arena = StubArena::with_script(vec![ScriptedMove::Reject, ScriptedMove::AcceptAndWin]);

        let state = arena.create_match(request(challenger, opponent)).await.unwrap();
        assert!(arena.submit_move(state.id, challenger, "all-in").await.is_err());
        let s = arena.submit_move(state.id, challenger, "call").await.unwrap();
        assert_eq!(s.status, MatchStatus::Complete);
        assert_eq!(arena.moves_seen(state.id), vec![String::from("call")]);
    }
}
