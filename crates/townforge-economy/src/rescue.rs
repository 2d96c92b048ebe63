//! Solvency rescue ledger: eligibility, grants, and debt repayment.
//!
//! Rescue state is process-memory only. On restart the ledger starts
//! empty: outstanding debt becomes zero (economically a pool loss, not
//! an agent liability) and every window reopens. Pool math stays solvent
//! either way because grants are always taken through the floor-guarded
//! pool store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::debug;
use townforge_types::AgentId;

use crate::constants::{
    SOLVENCY_RESCUE_COOLDOWN_TICKS, SOLVENCY_RESCUE_MAX_PER_WINDOW,
    SOLVENCY_RESCUE_REPAYMENT_BPS, SOLVENCY_RESCUE_REPAYMENT_FLOOR,
    SOLVENCY_RESCUE_TRIGGER_BANKROLL, SOLVENCY_RESCUE_TRIGGER_RESERVE,
    SOLVENCY_RESCUE_WINDOW_TICKS,
};
use crate::error::EconomyError;

/// Per-agent rescue counters.
#[derive(Debug, Clone, Copy, Default)]
struct RescueState {
    /// Outstanding $ARENA owed back to the pool.
    debt: i64,
    /// Tick of the last rescue, if any.
    last_rescue_tick: Option<u64>,
    /// Start of the current sliding window.
    window_start: u64,
    /// Rescues issued inside the current window.
    rescues_in_window: u32,
}

/// A grant the ledger has authorized (the caller still withdraws it
/// through the floor-guarded pool store).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RescueGrant {
    /// The rescued agent.
    pub agent_id: AgentId,
    /// The tick of the grant.
    pub tick: u64,
}

/// In-memory rescue ledger shared by all agent pipelines.
#[derive(Debug, Default)]
pub struct RescueLedger {
    state: Mutex<BTreeMap<AgentId, RescueState>>,
}

impl RescueLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<AgentId, RescueState>>, EconomyError> {
        self.state.lock().map_err(|_| EconomyError::LedgerPoisoned)
    }

    /// Whether the agent satisfies the rescue eligibility predicate at
    /// this tick: alive, broke on both balances, cooled down, and under
    /// the per-window cap.
    pub fn is_eligible(
        &self,
        agent_id: AgentId,
        tick: u64,
        bankroll: i64,
        reserve: i64,
        health: i32,
    ) -> Result<bool, EconomyError> {
        if health <= 0
            || bankroll > SOLVENCY_RESCUE_TRIGGER_BANKROLL
            || reserve > SOLVENCY_RESCUE_TRIGGER_RESERVE
        {
            return Ok(false);
        }
        let state = self.lock()?;
        let entry = state.get(&agent_id).copied().unwrap_or_default();
        if let Some(last) = entry.last_rescue_tick
            && tick.saturating_sub(last) < SOLVENCY_RESCUE_COOLDOWN_TICKS
        {
            return Ok(false);
        }
        let in_window = tick.saturating_sub(entry.window_start) < SOLVENCY_RESCUE_WINDOW_TICKS;
        if in_window && entry.rescues_in_window >= SOLVENCY_RESCUE_MAX_PER_WINDOW {
            return Ok(false);
        }
        Ok(true)
    }

    /// Record an issued rescue: stamp the cooldown, advance the window
    /// counter (resetting an expired window), and accumulate debt for
    /// the amount actually granted.
    pub fn record_rescue(
        &self,
        agent_id: AgentId,
        tick: u64,
        granted: i64,
    ) -> Result<(), EconomyError> {
        let mut state = self.lock()?;
        let entry = state.entry(agent_id).or_default();
        if tick.saturating_sub(entry.window_start) >= SOLVENCY_RESCUE_WINDOW_TICKS {
            entry.window_start = tick;
            entry.rescues_in_window = 0;
        }
        entry.rescues_in_window = entry.rescues_in_window.saturating_add(1);
        entry.last_rescue_tick = Some(tick);
        entry.debt = entry.debt.saturating_add(granted.max(0));
        debug!(
            agent_id = %agent_id,
            tick,
            granted,
            debt = entry.debt,
            rescues_in_window = entry.rescues_in_window,
            "rescue recorded"
        );
        Ok(())
    }

    /// Outstanding debt for the agent.
    pub fn debt(&self, agent_id: AgentId) -> Result<i64, EconomyError> {
        let state = self.lock()?;
        Ok(state.get(&agent_id).map_or(0, |e| e.debt))
    }

    /// The repayment due this tick, given the agent's bankroll:
    /// `clamp(1..=debt, floor(repayable * 25%))` when the bankroll sits
    /// above the repayment floor and debt is live; zero otherwise.
    pub fn repayment_due(&self, agent_id: AgentId, bankroll: i64) -> Result<i64, EconomyError> {
        let debt = self.debt(agent_id)?;
        if debt <= 0 || bankroll <= SOLVENCY_RESCUE_REPAYMENT_FLOOR {
            return Ok(0);
        }
        let repayable = bankroll.saturating_sub(SOLVENCY_RESCUE_REPAYMENT_FLOOR);
        let share = repayable
            .saturating_mul(SOLVENCY_RESCUE_REPAYMENT_BPS)
            .checked_div(10_000)
            .unwrap_or(0);
        Ok(share.clamp(1, debt))
    }

    /// Apply a repayment, reducing the agent's debt.
    pub fn apply_repayment(&self, agent_id: AgentId, amount: i64) -> Result<i64, EconomyError> {
        let mut state = self.lock()?;
        let entry = state.entry(agent_id).or_default();
        entry.debt = entry.debt.saturating_sub(amount.max(0)).max(0);
        Ok(entry.debt)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::constants::SOLVENCY_RESCUE_ARENA;

    #[test]
    fn eligibility_requires_both_balances_low() {
        let ledger = RescueLedger::new();
        let id = AgentId::new();
        assert!(ledger.is_eligible(id, 10, 35, 5, 50).unwrap());
        assert!(!ledger.is_eligible(id, 10, 36, 5, 50).unwrap());
        assert!(!ledger.is_eligible(id, 10, 35, 6, 50).unwrap());
        assert!(!ledger.is_eligible(id, 10, 35, 5, 0).unwrap());
    }

    #[test]
    fn cooldown_blocks_back_to_back_rescues() {
        let ledger = RescueLedger::new();
        let id = AgentId::new();
        ledger.record_rescue(id, 10, SOLVENCY_RESCUE_ARENA).unwrap();
        assert!(!ledger.is_eligible(id, 11, 0, 0, 50).unwrap());
        assert!(!ledger.is_eligible(id, 12, 0, 0, 50).unwrap());
        assert!(ledger.is_eligible(id, 13, 0, 0, 50).unwrap());
    }

    #[test]
    fn window_caps_at_two_rescues() {
        let ledger = RescueLedger::new();
        let id = AgentId::new();
        ledger.record_rescue(id, 10, SOLVENCY_RESCUE_ARENA).unwrap();
        ledger.record_rescue(id, 13, SOLVENCY_RESCUE_ARENA).unwrap();
        // Third rescue inside the 16-tick window is blocked even though
        // the cooldown has elapsed.
        assert!(!ledger.is_eligible(id, 17, 0, 0, 50).unwrap());
        // A new window opens 16 ticks after the window start.
        assert!(ledger.is_eligible(id, 26, 0, 0, 50).unwrap());
    }

    #[test]
    fn repayment_is_proportional_and_clamped() {
        let ledger = RescueLedger::new();
        let id = AgentId::new();
        ledger.record_rescue(id, 1, 30).unwrap();

        // Below the floor: nothing due.
        assert_eq!(ledger.repayment_due(id, 90).unwrap(), 0);
        // 110 - 90 = 20 repayable, 25% -> 5.
        assert_eq!(ledger.repayment_due(id, 110).unwrap(), 5);
        // Tiny surplus still repays at least 1.
        assert_eq!(ledger.repayment_due(id, 92).unwrap(), 1);
        // Huge surplus never exceeds live debt.
        assert_eq!(ledger.repayment_due(id, 100_000).unwrap(), 30);
    }

    #[test]
    fn repayment_monotonically_reduces_debt() {
        let ledger = RescueLedger::new();
        let id = AgentId::new();
        ledger.record_rescue(id, 1, 30).unwrap();

        let mut bankroll = 200;
        let mut last_debt = ledger.debt(id).unwrap();
        while ledger.debt(id).unwrap() > 0 {
            let due = ledger.repayment_due(id, bankroll).unwrap();
            assert!(due >= 1);
            let debt = ledger.apply_repayment(id, due).unwrap();
            assert!(debt < last_debt);
            last_debt = debt;
            bankroll -= due;
        }
        assert_eq!(ledger.repayment_due(id, 200).unwrap(), 0);
    }

    #[test]
    fn unknown_agent_has_no_debt() {
        let ledger = RescueLedger::new();
        assert_eq!(ledger.debt(AgentId::new()).unwrap(), 0);
    }
}
