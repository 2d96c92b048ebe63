//! Policy overlay diagnostics and the override-rate budget window.

use serde::{Deserialize, Serialize};

/// Severity tier of a policy note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyTier {
    /// Must always apply (incapacitation, invariant protection).
    HardSafety,
    /// Applies when the soft budget is open; protects the bankroll.
    EconomicWarning,
    /// Applies when the soft budget is open; improves play.
    StrategyNudge,
}

/// Identifying code of a policy overlay rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyCode {
    /// Trade chosen fewer than the cooldown ticks after the last trade.
    TradeCooldown,
    /// Trade chosen without a `why` and `next_action` plan.
    TradeWithoutPlan,
    /// Rest chosen while plots are available and none owned.
    InitialFoothold,
    /// A build is ready to complete and was not chosen.
    CompleteReadyBuild,
    /// A build is in progress and was not continued.
    KeepBuildMomentum,
    /// A claimed plot sits idle and no build was started.
    StartClaimedBuild,
    /// A race/pact objective targets a claimable plot before its deadline.
    LiveObjectiveClaim,
    /// The chosen spend exceeds bankroll beyond what reserve could cover.
    UnderfundedAction,
}

/// One diagnostic produced by a policy overlay rule.
///
/// Notes are carried into the emitted decision record whether or not the
/// rule rewrote the action; `applied` distinguishes the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyNote {
    /// Severity tier.
    pub tier: PolicyTier,
    /// Rule code.
    pub code: PolicyCode,
    /// Human-readable explanation.
    pub message: String,
    /// Whether the rule actually rewrote the action.
    pub applied: bool,
}

/// Override-rate sample over a bounded window of recent decisions.
///
/// The soft-policy budget is open while fewer than 40% of the last
/// [`OVERRIDE_WINDOW`] decisions were overridden. The comparison is done
/// in integer arithmetic: `overrides * 10 < window * 4`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRate {
    /// Number of overridden decisions in the window.
    pub overrides: u32,
    /// Number of decisions observed in the window.
    pub window: u32,
}

/// Length of the override-rate sliding window, in decisions.
pub const OVERRIDE_WINDOW: usize = 24;

/// Budget threshold: the overlay may rewrite while the override rate is
/// strictly below 40%.
pub const OVERRIDE_BUDGET_NUM: u32 = 4;

/// Denominator of the budget threshold fraction.
pub const OVERRIDE_BUDGET_DEN: u32 = 10;

impl OverrideRate {
    /// Whether the soft-policy budget is open at this rate.
    ///
    /// An empty window is an open budget.
    pub fn budget_open(self) -> bool {
        if self.window == 0 {
            return true;
        }
        // overrides / window < 4 / 10, cross-multiplied.
        u64::from(self.overrides).saturating_mul(u64::from(OVERRIDE_BUDGET_DEN))
            < u64::from(self.window).saturating_mul(u64::from(OVERRIDE_BUDGET_NUM))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_is_open() {
        assert!(OverrideRate::default().budget_open());
    }

    #[test]
    fn budget_closes_at_forty_percent() {
        // 9/24 = 37.5% -> open; 10/24 ~= 41.7% -> closed.
        assert!(OverrideRate { overrides: 9, window: 24 }.budget_open());
        assert!(!OverrideRate { overrides: 10, window: 24 }.budget_open());
        // Exactly 40% is not strictly below the threshold.
        assert!(!OverrideRate { overrides: 4, window: 10 }.budget_open());
    }
}
