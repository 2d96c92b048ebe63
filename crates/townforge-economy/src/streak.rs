//! Non-rest retention streaks.
//!
//! Any action other than `rest` extends an agent's streak by exactly
//! one; any `rest` resets it to zero. Milestones pay a one-shot reward
//! the first time each is reached within a single streak.

use std::collections::BTreeMap;
use std::sync::Mutex;

use townforge_types::AgentId;

use crate::constants::STREAK_MILESTONES;
use crate::error::EconomyError;

/// One agent's streak counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonRestStreak {
    /// Current consecutive non-rest actions.
    pub current: u32,
    /// Best streak ever observed.
    pub best: u32,
    /// Highest milestone already rewarded in the current streak.
    pub last_rewarded_milestone: u32,
}

/// A milestone reward owed to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakReward {
    /// The milestone reached.
    pub milestone: u32,
    /// $ARENA owed (funded through the floor-guarded pool).
    pub amount: i64,
}

/// In-memory streak book shared by all agent pipelines.
#[derive(Debug, Default)]
pub struct StreakBook {
    state: Mutex<BTreeMap<AgentId, NonRestStreak>>,
}

impl StreakBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one executed action. Returns the milestone reward newly
    /// earned by this action, if any.
    pub fn record(
        &self,
        agent_id: AgentId,
        is_rest: bool,
    ) -> Result<Option<StreakReward>, EconomyError> {
        let mut state = self.state.lock().map_err(|_| EconomyError::LedgerPoisoned)?;
        let streak = state.entry(agent_id).or_default();

        if is_rest {
            streak.current = 0;
            streak.last_rewarded_milestone = 0;
            return Ok(None);
        }

        streak.current = streak.current.saturating_add(1);
        streak.best = streak.best.max(streak.current);

        for (milestone, amount) in STREAK_MILESTONES {
            if streak.current == milestone && streak.last_rewarded_milestone < milestone {
                streak.last_rewarded_milestone = milestone;
                return Ok(Some(StreakReward { milestone, amount }));
            }
        }
        Ok(None)
    }

    /// Current streak snapshot for an agent.
    pub fn snapshot(&self, agent_id: AgentId) -> Result<NonRestStreak, EconomyError> {
        let state = self.state.lock().map_err(|_| EconomyError::LedgerPoisoned)?;
        Ok(state.get(&agent_id).copied().unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn streak_increments_and_rewards_milestones() {
        let book = StreakBook::new();
        let id = AgentId::new();

        assert!(book.record(id, false).unwrap().is_none()); // 1
        assert!(book.record(id, false).unwrap().is_none()); // 2
        let reward = book.record(id, false).unwrap(); // 3
        assert_eq!(reward, Some(StreakReward { milestone: 3, amount: 6 }));
        assert!(book.record(id, false).unwrap().is_none()); // 4
        let reward = book.record(id, false).unwrap(); // 5
        assert_eq!(reward, Some(StreakReward { milestone: 5, amount: 10 }));
    }

    #[test]
    fn rest_resets_streak_and_rearms_milestones() {
        let book = StreakBook::new();
        let id = AgentId::new();

        for _ in 0..3 {
            let _ = book.record(id, false).unwrap();
        }
        assert_eq!(book.snapshot(id).unwrap().current, 3);

        assert!(book.record(id, true).unwrap().is_none());
        let snap = book.snapshot(id).unwrap();
        assert_eq!(snap.current, 0);
        assert_eq!(snap.best, 3);

        // After the reset, milestone 3 pays again on a fresh streak.
        let _ = book.record(id, false).unwrap();
        let _ = book.record(id, false).unwrap();
        let reward = book.record(id, false).unwrap();
        assert_eq!(reward.map(|r| r.milestone), Some(3));
    }

    #[test]
    fn each_milestone_pays_once_per_streak() {
        let book = StreakBook::new();
        let id = AgentId::new();

        let mut rewards = Vec::new();
        for _ in 0..13 {
            if let Some(reward) = book.record(id, false).unwrap() {
                rewards.push(reward.milestone);
            }
        }
        assert_eq!(rewards, vec![3, 5, 8, 13]);
        assert_eq!(book.snapshot(id).unwrap().best, 13);
    }
}
