//! Soft policy overlay: budgeted corrections applied after a model
//! decision.
//!
//! Each rule inspects the chosen action against the observation and may
//! rewrite it, but only while the agent's override budget is open (fewer
//! than 40% of the last 24 decisions overridden). A rule that fires with
//! a closed budget still leaves a diagnostic note with `applied: false`,
//! so the decision record shows what the overlay *wanted* to do.
//!
//! Rules run in a fixed order; later rules see earlier rewrites.

use tracing::debug;
use townforge_types::{
    Action, ActionParams, ActionType, GoalKind, Observation, OverrideRate, PolicyCode,
    PolicyNote, PolicyTier, SkillKind,
};

use townforge_economy::{build_cost, claim_cost};

use crate::concept::default_building_concept;

/// Ticks an agent must wait between AMM trades before the cooldown
/// overlay stops converting trades to rest.
pub const TRADE_COOLDOWN_TICKS: u64 = 3;

/// The overlay's verdict on one decision.
#[derive(Debug, Clone)]
pub struct OverlayOutcome {
    /// The action after any rewrites.
    pub action: Action,
    /// Diagnostics from every rule that fired.
    pub notes: Vec<PolicyNote>,
    /// Whether any rule actually rewrote the action.
    pub overridden: bool,
}

/// Apply the overlay chain to a model decision.
pub fn apply_overlays(
    action: Action,
    observation: &Observation,
    rate: OverrideRate,
) -> OverlayOutcome {
    let budget_open = rate.budget_open();
    let mut state = OverlayState {
        action,
        notes: Vec::new(),
        overridden: false,
        budget_open,
    };

    trade_cooldown(&mut state, observation);
    trade_without_plan(&mut state);
    initial_foothold(&mut state, observation);
    build_priority(&mut state, observation);
    live_objective_claim(&mut state, observation);
    underfunded_action(&mut state, observation);

    if state.overridden {
        debug!(
            agent_id = %observation.self_view.id,
            tick = observation.tick,
            executed = ?state.action.action_type,
            "policy overlay rewrote the decision"
        );
    }

    OverlayOutcome {
        action: state.action,
        notes: state.notes,
        overridden: state.overridden,
    }
}

/// Working state threaded through the rule chain.
struct OverlayState {
    action: Action,
    notes: Vec<PolicyNote>,
    overridden: bool,
    budget_open: bool,
}

impl OverlayState {
    /// Record a rule firing; rewrite only when the budget allows it.
    fn fire(
        &mut self,
        tier: PolicyTier,
        code: PolicyCode,
        message: String,
        rewrite: Option<(ActionParams, &str)>,
    ) {
        let mut applied = false;
        if let Some((params, why)) = rewrite
            && self.budget_open
        {
            self.action = self.action.redirect(params, why);
            self.overridden = true;
            applied = true;
        }
        self.notes.push(PolicyNote {
            tier,
            code,
            message,
            applied,
        });
    }

    const fn is_build_step(&self) -> bool {
        matches!(
            self.action.action_type,
            ActionType::DoWork | ActionType::CompleteBuild | ActionType::StartBuild
        )
    }

    /// Build steering defers to an in-flight blueprint purchase.
    const fn is_blueprint_purchase(&self) -> bool {
        matches!(
            self.action.params,
            ActionParams::BuySkill {
                skill: SkillKind::BlueprintIndex,
                ..
            }
        )
    }
}

/// Convert trades made too soon after the last one into rest.
fn trade_cooldown(state: &mut OverlayState, observation: &Observation) {
    if !matches!(
        state.action.action_type,
        ActionType::BuyArena | ActionType::SellArena
    ) {
        return;
    }
    let Some(since) = observation.self_view.ticks_since_last_trade else {
        return;
    };
    if since < TRADE_COOLDOWN_TICKS {
        state.fire(
            PolicyTier::EconomicWarning,
            PolicyCode::TradeCooldown,
            format!("traded {since} ticks ago; cooling down"),
            Some((ActionParams::Rest, "trade cooldown active")),
        );
    }
}

/// Convert plan-less trades into rest.
fn trade_without_plan(state: &mut OverlayState) {
    let missing_plan = match &state.action.params {
        ActionParams::BuyArena { why, next_action, .. }
        | ActionParams::SellArena { why, next_action, .. } => {
            why.is_none() || next_action.is_none()
        }
        _ => false,
    };
    if missing_plan {
        state.fire(
            PolicyTier::EconomicWarning,
            PolicyCode::TradeWithoutPlan,
            String::from("trade carries no why/next_action plan"),
            Some((ActionParams::Rest, "refusing an unplanned trade")),
        );
    }
}

/// Landless agents should claim before they rest.
fn initial_foothold(state: &mut OverlayState, observation: &Observation) {
    if state.action.action_type != ActionType::Rest
        || !observation.my_plots.is_empty()
        || observation.available_plots.is_empty()
    {
        return;
    }
    let mut available: Vec<_> = observation.available_plots.iter().collect();
    available.sort_by_key(|p| p.index);
    if let Some(plot) = available.first() {
        state.fire(
            PolicyTier::StrategyNudge,
            PolicyCode::InitialFoothold,
            String::from("resting with no plots while land is claimable"),
            Some((
                ActionParams::ClaimPlot {
                    plot_index: Some(plot.index),
                },
                "claiming an initial foothold",
            )),
        );
    }
}

/// Steer toward the highest-priority build step not already chosen.
fn build_priority(state: &mut OverlayState, observation: &Observation) {
    if state.is_build_step() || state.is_blueprint_purchase() {
        return;
    }

    if let Some(plot) = observation.ready_to_complete() {
        state.fire(
            PolicyTier::StrategyNudge,
            PolicyCode::CompleteReadyBuild,
            format!("plot {} is ready to complete", plot.index),
            Some((
                ActionParams::CompleteBuild {
                    plot_id: Some(plot.id),
                    plot_index: Some(plot.index),
                },
                "finishing a ready build",
            )),
        );
        return;
    }

    if let Some(plot) = observation.under_construction().first() {
        state.fire(
            PolicyTier::StrategyNudge,
            PolicyCode::KeepBuildMomentum,
            format!("plot {} is mid-construction", plot.index),
            Some((
                ActionParams::DoWork {
                    plot_id: Some(plot.id),
                    plot_index: Some(plot.index),
                },
                "keeping build momentum",
            )),
        );
        return;
    }

    if let Some(plot) = observation.claimed_idle().first() {
        state.fire(
            PolicyTier::StrategyNudge,
            PolicyCode::StartClaimedBuild,
            format!("claimed plot {} sits idle", plot.index),
            Some((
                ActionParams::StartBuild {
                    building_type: default_building_concept(plot.zone).to_owned(),
                    plot_id: Some(plot.id),
                    plot_index: Some(plot.index),
                },
                "starting on a claimed plot",
            )),
        );
    }
}

/// Claim the plot a race/pact objective targets before its deadline.
fn live_objective_claim(state: &mut OverlayState, observation: &Observation) {
    if state.action.action_type == ActionType::ClaimPlot {
        return;
    }
    let live_target = observation.goals.iter().find(|goal| {
        matches!(goal.kind, GoalKind::Race | GoalKind::Pact)
            && goal
                .deadline_tick
                .is_none_or(|deadline| deadline >= observation.tick)
            && goal.target_plot_index.is_some_and(|index| {
                observation.available_plots.iter().any(|p| p.index == index)
            })
    });
    if let Some(goal) = live_target
        && let Some(index) = goal.target_plot_index
    {
        state.fire(
            PolicyTier::StrategyNudge,
            PolicyCode::LiveObjectiveClaim,
            format!("objective targets claimable plot {index}"),
            Some((
                ActionParams::ClaimPlot {
                    plot_index: Some(index),
                },
                "claiming an objective plot before its deadline",
            )),
        );
    }
}

/// Warn (never rewrite) when the chosen spend outruns total liquidity.
fn underfunded_action(state: &mut OverlayState, observation: &Observation) {
    let Some(spend) = estimated_spend(&state.action, observation) else {
        return;
    };
    let liquidity = observation
        .self_view
        .bankroll
        .saturating_add(observation.self_view.reserve_balance);
    if spend > liquidity {
        state.fire(
            PolicyTier::EconomicWarning,
            PolicyCode::UnderfundedAction,
            format!("estimated spend {spend} exceeds liquidity {liquidity}"),
            None,
        );
    }
}

/// Estimate the $ARENA spend of an action, where one is knowable.
fn estimated_spend(action: &Action, observation: &Observation) -> Option<i64> {
    let level = observation.town.as_ref().map_or(1, |t| t.level);
    let claimed = observation.town.as_ref().map_or(0, |t| t.plots_claimed);
    let bootstrap = observation.my_plots.is_empty();
    match &action.params {
        ActionParams::SellArena { amount_in, .. } => Some(*amount_in),
        ActionParams::TransferArena { amount, .. } => Some(*amount),
        ActionParams::PlayArena { wager, .. } => *wager,
        ActionParams::ClaimPlot { .. } => Some(claim_cost(level, claimed, bootstrap)),
        ActionParams::StartBuild { plot_id, plot_index, .. } => {
            let zone = observation
                .my_plots
                .iter()
                .chain(observation.available_plots.iter())
                .find(|p| Some(p.id) == *plot_id || Some(p.index) == *plot_index)
                .map(|p| p.zone)?;
            Some(build_cost(
                zone,
                level,
                observation.world.cost_multiplier,
                bootstrap,
            ))
        }
        _ => None,
    }
}
