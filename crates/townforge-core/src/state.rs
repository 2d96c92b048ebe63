//! Process-scoped mutable engine state.
//!
//! These maps live only in memory and reset to empty on restart; every
//! consumer is written to tolerate that (the rescue ledger's forgotten
//! debt is a pool loss, trade cooldowns reopen, loop modes fall back to
//! the persisted default). Access happens from the scheduler and from
//! per-agent pipelines, so everything sits behind short-lived mutexes
//! that are never held across an await point.

use std::collections::BTreeMap;
use std::sync::Mutex;

use townforge_economy::{RescueLedger, StreakBook};
use townforge_policy::OverrideHistory;
use townforge_types::{AgentId, HumanInstruction, LoopMode};

/// Bundle of all process-scoped mutable maps.
#[derive(Debug, Default)]
pub struct EngineState {
    /// Per-agent loop-mode overrides.
    loop_modes: Mutex<BTreeMap<AgentId, LoopMode>>,
    /// Queued human instructions, drained at the agent's next tick.
    instructions: Mutex<BTreeMap<AgentId, Vec<HumanInstruction>>>,
    /// Tick of the agent's last AMM trade.
    last_trade_tick: Mutex<BTreeMap<AgentId, u64>>,
    /// Solvency rescue counters.
    pub rescues: RescueLedger,
    /// Non-rest streak counters.
    pub streaks: StreakBook,
    /// Soft-policy override window.
    pub overrides: OverrideHistory,
}

impl EngineState {
    /// Create empty engine state.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Loop mode
    // -----------------------------------------------------------------------

    /// The agent's loop mode override; `Default` when no mapping exists.
    pub fn loop_mode(&self, agent_id: AgentId) -> LoopMode {
        self.loop_modes
            .lock()
            .ok()
            .and_then(|m| m.get(&agent_id).copied())
            .unwrap_or_default()
    }

    /// Set the agent's loop mode. Setting `Default` removes the mapping.
    pub fn set_loop_mode(&self, agent_id: AgentId, mode: LoopMode) {
        if let Ok(mut modes) = self.loop_modes.lock() {
            if mode == LoopMode::Default {
                modes.remove(&agent_id);
            } else {
                modes.insert(agent_id, mode);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Instruction queue
    // -----------------------------------------------------------------------

    /// Queue a human instruction for the agent's next tick.
    pub fn queue_instruction(&self, agent_id: AgentId, instruction: HumanInstruction) {
        if let Ok(mut queues) = self.instructions.lock() {
            queues.entry(agent_id).or_default().push(instruction);
        }
    }

    /// Drain all queued instructions for the agent.
    pub fn drain_instructions(&self, agent_id: AgentId) -> Vec<HumanInstruction> {
        self.instructions
            .lock()
            .ok()
            .and_then(|mut queues| queues.remove(&agent_id))
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Trade cooldown
    // -----------------------------------------------------------------------

    /// Record an AMM trade at the given tick.
    pub fn note_trade(&self, agent_id: AgentId, tick: u64) {
        if let Ok(mut ticks) = self.last_trade_tick.lock() {
            ticks.insert(agent_id, tick);
        }
    }

    /// Ticks since the agent's last trade, if it ever traded.
    pub fn ticks_since_last_trade(&self, agent_id: AgentId, tick: u64) -> Option<u64> {
        self.last_trade_tick
            .lock()
            .ok()
            .and_then(|ticks| ticks.get(&agent_id).copied())
            .map(|last| tick.saturating_sub(last))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use townforge_types::NudgeKind;

    #[test]
    fn loop_mode_defaults_and_persists() {
        let state = EngineState::new();
        let id = AgentId::new();

        assert_eq!(state.loop_mode(id), LoopMode::Default);

        state.set_loop_mode(id, LoopMode::DegenLoop);
        assert_eq!(state.loop_mode(id), LoopMode::DegenLoop);

        // Resetting to Default removes the mapping entirely.
        state.set_loop_mode(id, LoopMode::Default);
        assert_eq!(state.loop_mode(id), LoopMode::Default);
        assert!(state.loop_modes.lock().unwrap().is_empty());
    }

    #[test]
    fn instructions_drain_once() {
        let state = EngineState::new();
        let id = AgentId::new();
        state.queue_instruction(
            id,
            HumanInstruction {
                sender: String::from("ren"),
                text: String::from("build something"),
                nudge: Some(NudgeKind::Build),
            },
        );

        let drained = state.drain_instructions(id);
        assert_eq!(drained.len(), 1);
        assert!(state.drain_instructions(id).is_empty());
    }

    #[test]
    fn trade_cooldown_tracks_distance() {
        let state = EngineState::new();
        let id = AgentId::new();

        assert_eq!(state.ticks_since_last_trade(id, 10), None);
        state.note_trade(id, 8);
        assert_eq!(state.ticks_since_last_trade(id, 10), Some(2));
    }
}
