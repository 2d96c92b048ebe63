//! Sliding window of recent overlay overrides, per agent.
//!
//! The soft-policy budget closes once 40% of the last 24 decisions were
//! overridden, keeping the overlay from steamrolling the model. The
//! window lives in process memory and resets on restart.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use townforge_types::{AgentId, OverrideRate, OVERRIDE_WINDOW};

/// Per-agent override history over the last [`OVERRIDE_WINDOW`] decisions.
#[derive(Debug, Default)]
pub struct OverrideHistory {
    state: Mutex<BTreeMap<AgentId, VecDeque<bool>>>,
}

impl OverrideHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// The agent's current override rate.
    pub fn rate(&self, agent_id: AgentId) -> OverrideRate {
        self.state.lock().map_or_else(
            |_| OverrideRate::default(),
            |state| {
                state.get(&agent_id).map_or_else(OverrideRate::default, |window| {
                    let overrides =
                        u32::try_from(window.iter().filter(|o| **o).count()).unwrap_or(u32::MAX);
                    let len = u32::try_from(window.len()).unwrap_or(u32::MAX);
                    OverrideRate {
                        overrides,
                        window: len,
                    }
                })
            },
        )
    }

    /// Record one decision outcome and return the rate after recording.
    pub fn record(&self, agent_id: AgentId, overridden: bool) -> OverrideRate {
        if let Ok(mut state) = self.state.lock() {
            let window = state.entry(agent_id).or_default();
            window.push_back(overridden);
            while window.len() > OVERRIDE_WINDOW {
                window.pop_front();
            }
        }
        self.rate(agent_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_has_open_budget() {
        let history = OverrideHistory::new();
        assert!(history.rate(AgentId::new()).budget_open());
    }

    #[test]
    fn window_is_bounded_and_slides() {
        let history = OverrideHistory::new();
        let id = AgentId::new();

        // Fill the window with overrides, then push clean decisions
        // until the old overrides age out.
        for _ in 0..OVERRIDE_WINDOW {
            let _ = history.record(id, true);
        }
        assert!(!history.rate(id).budget_open());

        for _ in 0..OVERRIDE_WINDOW {
            let _ = history.record(id, false);
        }
        let rate = history.rate(id);
        assert_eq!(rate.overrides, 0);
        assert_eq!(rate.window, u32::try_from(OVERRIDE_WINDOW).unwrap());
        assert!(rate.budget_open());
    }

    #[test]
    fn budget_closes_at_ten_overrides_of_24() {
        let history = OverrideHistory::new();
        let id = AgentId::new();

        for i in 0..OVERRIDE_WINDOW {
            let _ = history.record(id, i < 10);
        }
        assert!(!history.rate(id).budget_open());
    }
}
