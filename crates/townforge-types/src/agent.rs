//! Persistent agent state as the engine sees it.
//!
//! Agents are created and persisted by the host; the engine mutates only
//! the fields on [`AgentProfile`] and always through the agent's own tick
//! pipeline (except rescue and bounty credits).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ActionType, Archetype, LoopMode};
use crate::ids::{AgentId, MatchId};

/// Upper bound on scratchpad journal entries kept per agent.
pub const SCRATCHPAD_CAPACITY: usize = 20;

/// An agent's identity plus the persistent state the engine maintains.
///
/// Invariants: `bankroll >= 0`, `reserve_balance >= 0`,
/// `health` in `0..=100`. An agent at `health == 0` is *incapacitated*
/// and may only rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Stable identifier.
    pub id: AgentId,
    /// Display name (unique per deployment; used for transfers).
    pub name: String,
    /// Personality tag seeding prompts and temperature.
    pub archetype: Archetype,
    /// Model identifier resolved through the model gateway.
    pub model_id: String,
    /// $ARENA balance (integer fuel token).
    pub bankroll: i64,
    /// Stable-currency balance, swapable via the AMM.
    pub reserve_balance: i64,
    /// Health in `0..=100`.
    pub health: i32,
    /// PvP rating.
    pub elo: i32,
    /// Whether the scheduler ticks this agent.
    pub is_active: bool,
    /// Whether the agent is currently inside a PvP match.
    pub is_in_match: bool,
    /// The match the agent is in, if any.
    pub current_match_id: Option<MatchId>,
    /// Bounded journal of recent decisions and outcomes (newest last).
    pub scratchpad: Vec<String>,
    /// Decision path switch; `DegenLoop` bypasses the model.
    pub loop_mode: LoopMode,
    /// The last executed action type.
    pub last_action_type: Option<ActionType>,
    /// The last decision's reasoning text.
    pub last_reasoning: Option<String>,
    /// The last execution narrative.
    pub last_narrative: Option<String>,
    /// The plot index last targeted, if any.
    pub last_target_plot: Option<u32>,
    /// Tick number of the agent's last processed tick.
    pub last_tick_at: Option<u64>,
    /// Wall-clock time of the agent's last processed tick; drives
    /// oldest-first round-robin fairness in the upkeep sweep.
    pub last_active_at: Option<DateTime<Utc>>,
    /// Owner-supplied system prompt override, if any.
    pub system_prompt: Option<String>,
}

impl AgentProfile {
    /// Whether the agent is incapacitated (health exhausted).
    pub const fn is_incapacitated(&self) -> bool {
        self.health <= 0
    }

    /// Append a journal entry, trimming oldest entries beyond
    /// [`SCRATCHPAD_CAPACITY`].
    pub fn journal(&mut self, entry: String) {
        self.scratchpad.push(entry);
        let len = self.scratchpad.len();
        if len > SCRATCHPAD_CAPACITY {
            let excess = len.saturating_sub(SCRATCHPAD_CAPACITY);
            self.scratchpad.drain(..excess);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn profile() -> AgentProfile {
        AgentProfile {
            id: AgentId::new(),
            name: String::from("Mags"),
            archetype: Archetype::Grinder,
            model_id: String::from("default"),
            bankroll: 100,
            reserve_balance: 50,
            health: 100,
            elo: 1200,
            is_active: true,
            is_in_match: false,
            current_match_id: None,
            scratchpad: Vec::new(),
            loop_mode: LoopMode::Default,
            last_action_type: None,
            last_reasoning: None,
            last_narrative: None,
            last_target_plot: None,
            last_tick_at: None,
            last_active_at: None,
            system_prompt: None,
        }
    }

    #[test]
    fn incapacitated_at_zero_health() {
        let mut agent = profile();
        assert!(!agent.is_incapacitated());
        agent.health = 0;
        assert!(agent.is_incapacitated());
    }

    #[test]
    fn journal_is_bounded() {
        let mut agent = profile();
        for i in 0..30 {
            agent.journal(format!("entry {i}"));
        }
        assert_eq!(agent.scratchpad.len(), SCRATCHPAD_CAPACITY);
        // Oldest entries were trimmed; newest survive.
        assert_eq!(agent.scratchpad.first().map(String::as_str), Some("entry 10"));
        assert_eq!(agent.scratchpad.last().map(String::as_str), Some("entry 29"));
    }
}
