//! Manual operator action planner.
//!
//! `plan_deterministic_action` is the pure mapping operators use to
//! issue commands without seeing world state: given an observation and a
//! nudge kind it either yields a concrete intent with parameters or a
//! reasoned rejection. No side effects, no randomness, no clock -- the
//! same observation always produces the same plan.

use townforge_types::{
    ActionParams, ActionType, GameType, NudgeKind, Observation, PlotView, ReasonCode,
};

use townforge_economy::{claim_cost, DEFAULT_ARENA_WAGER};

use crate::concept::default_building_concept;

// ---------------------------------------------------------------------------
// Trade thresholds (shared with the degen loop's profit rotation)
// ---------------------------------------------------------------------------

/// Minimum reserve before a buy rotation makes sense.
pub const TRADE_BUY_MIN_RESERVE: i64 = 12;

/// Bankroll above which buying more $ARENA stops being useful.
pub const TRADE_BUY_MAX_BANKROLL: i64 = 130;

/// Minimum bankroll before a sell rotation is allowed.
pub const TRADE_SELL_MIN_BANKROLL: i64 = 40;

/// Bankroll the sell rotation tries to keep liquid.
pub const TRADE_SELL_KEEP: i64 = 130;

/// Smallest sell the rotation will bother with.
pub const TRADE_SELL_MIN_AMOUNT: i64 = 10;

/// A concrete plan produced for an operator command.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    /// The intent to put on the command.
    pub intent: ActionType,
    /// Parameters for the intent.
    pub params: ActionParams,
    /// Short operator-facing note on what the plan does.
    pub note: String,
}

/// A reasoned refusal to plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRejection {
    /// The semantic reason.
    pub reason_code: ReasonCode,
    /// Operator-facing explanation.
    pub reason: String,
}

/// Map an operator nudge to a concrete action against the observation.
pub fn plan_deterministic_action(
    observation: &Observation,
    kind: NudgeKind,
) -> Result<PlannedAction, PlanRejection> {
    match kind {
        NudgeKind::Rest => Ok(PlannedAction {
            intent: ActionType::Rest,
            params: ActionParams::Rest,
            note: String::from("Hold position this tick"),
        }),
        NudgeKind::Fight => Ok(plan_fight(observation)),
        NudgeKind::Work => plan_work(observation),
        NudgeKind::Build => plan_build(observation),
        NudgeKind::Trade => plan_trade(observation),
    }
}

/// Fight: use the announced wheel duel if one is open, else default
/// poker at the stock wager.
fn plan_fight(observation: &Observation) -> PlannedAction {
    let (game_type, wager) = if observation.wheel.is_fight_window() {
        (
            observation.wheel.game_type.unwrap_or(GameType::Poker),
            observation.wheel.wager.unwrap_or(DEFAULT_ARENA_WAGER),
        )
    } else {
        (GameType::Poker, DEFAULT_ARENA_WAGER)
    };
    PlannedAction {
        intent: ActionType::PlayArena,
        params: ActionParams::PlayArena {
            game_type: Some(game_type),
            wager: Some(wager),
            opponent: None,
        },
        note: format!("Queue a {game_type:?} match at {wager} $ARENA"),
    }
}

/// Work: continue the under-construction plot with the most progress.
fn plan_work(observation: &Observation) -> Result<PlannedAction, PlanRejection> {
    observation.under_construction().first().map_or_else(
        || {
            Err(PlanRejection {
                reason_code: ReasonCode::ConstraintViolation,
                reason: String::from("No active construction to work on"),
            })
        },
        |plot| Ok(work_plan(plot)),
    )
}

fn work_plan(plot: &PlotView) -> PlannedAction {
    PlannedAction {
        intent: ActionType::DoWork,
        params: ActionParams::DoWork {
            plot_id: Some(plot.id),
            plot_index: Some(plot.index),
        },
        note: format!("Continue construction on plot {}", plot.index),
    }
}

/// Build: prefer continuing, then starting on a claimed plot, then a
/// bootstrap claim.
fn plan_build(observation: &Observation) -> Result<PlannedAction, PlanRejection> {
    if let Some(plot) = observation.under_construction().first() {
        return Ok(work_plan(plot));
    }

    if let Some(plot) = observation.claimed_idle().first() {
        return Ok(PlannedAction {
            intent: ActionType::StartBuild,
            params: ActionParams::StartBuild {
                building_type: default_building_concept(plot.zone).to_owned(),
                plot_id: Some(plot.id),
                plot_index: Some(plot.index),
            },
            note: format!("Start a build on claimed plot {}", plot.index),
        });
    }

    // Bootstrap: claim the lowest-index available plot.
    let mut available: Vec<&PlotView> = observation.available_plots.iter().collect();
    available.sort_by_key(|p| p.index);
    let Some(plot) = available.first() else {
        return Err(PlanRejection {
            reason_code: ReasonCode::TargetUnavailable,
            reason: String::from("No claimable plot in the active town"),
        });
    };

    let level = observation.town.as_ref().map_or(1, |t| t.level);
    let claimed = observation.town.as_ref().map_or(0, |t| t.plots_claimed);
    let bootstrap = observation.my_plots.is_empty();
    let estimate = claim_cost(level, claimed, bootstrap);
    if observation.self_view.bankroll < estimate {
        return Err(PlanRejection {
            reason_code: ReasonCode::InsufficientArena,
            reason: format!(
                "Need about {estimate} $ARENA to claim a plot, have {}",
                observation.self_view.bankroll
            ),
        });
    }

    Ok(PlannedAction {
        intent: ActionType::ClaimPlot,
        params: ActionParams::ClaimPlot {
            plot_index: Some(plot.index),
        },
        note: format!("Claim plot {} to get a foothold", plot.index),
    })
}

/// Trade: rotate reserve into $ARENA when cash-poor, or skim $ARENA back
/// into reserve when flush.
fn plan_trade(observation: &Observation) -> Result<PlannedAction, PlanRejection> {
    let bankroll = observation.self_view.bankroll;
    let reserve = observation.self_view.reserve_balance;

    if reserve >= TRADE_BUY_MIN_RESERVE && bankroll <= TRADE_BUY_MAX_BANKROLL {
        return Ok(PlannedAction {
            intent: ActionType::BuyArena,
            params: ActionParams::BuyArena {
                amount_in: reserve,
                why: Some(String::from("Rotate idle reserve into working capital")),
                next_action: Some(String::from("play_arena")),
            },
            note: format!("Buy $ARENA with {reserve} reserve"),
        });
    }

    if bankroll >= TRADE_SELL_MIN_BANKROLL {
        let amount_in = bankroll.saturating_sub(TRADE_SELL_KEEP).max(TRADE_SELL_MIN_AMOUNT);
        return Ok(PlannedAction {
            intent: ActionType::SellArena,
            params: ActionParams::SellArena {
                amount_in,
                why: Some(String::from("Bank profits above the working float")),
                next_action: Some(String::from("start_build")),
            },
            note: format!("Sell {amount_in} $ARENA into reserve"),
        });
    }

    Err(PlanRejection {
        reason_code: ReasonCode::ConstraintViolation,
        reason: format!(
            "No sensible rotation: bankroll {bankroll}, reserve {reserve}"
        ),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use townforge_types::{
        AgentId, Archetype, PlotId, PlotStatus, PoolSummary, SelfView, TownId, TownStatus,
        TownView, Zone,
    };

    fn self_view(bankroll: i64, reserve: i64) -> SelfView {
        SelfView {
            id: AgentId::new(),
            name: String::from("Opal"),
            archetype: Archetype::Rock,
            bankroll,
            reserve_balance: reserve,
            health: 100,
            elo: 1200,
            is_in_match: false,
            scratchpad: Vec::new(),
            last_action_type: None,
            ticks_since_last_trade: None,
        }
    }

    fn pool() -> PoolSummary {
        PoolSummary {
            spot_price: Decimal::ONE,
            fee_bps: 100,
            reserve_balance: 10_000,
            arena_balance: 10_000,
        }
    }

    fn town(level: u32, claimed: u32) -> TownView {
        TownView {
            id: TownId::new(),
            name: format!("Town {level}"),
            level,
            status: TownStatus::Building,
            plots_total: 9,
            plots_claimed: claimed,
        }
    }

    fn plot(index: u32, zone: Zone, status: PlotStatus, work_steps: u32) -> townforge_types::PlotView {
        townforge_types::PlotView {
            id: PlotId::new(),
            town_id: TownId::new(),
            index,
            zone,
            status,
            owner: None,
            building_type: None,
            building_name: None,
            work_steps,
            build_cost: None,
        }
    }

    fn observation(bankroll: i64, reserve: i64) -> Observation {
        let mut obs = Observation::degenerate(5, self_view(bankroll, reserve), pool());
        obs.town = Some(town(1, 0));
        obs
    }

    #[test]
    fn rest_always_plans() {
        let obs = observation(0, 0);
        let plan = plan_deterministic_action(&obs, NudgeKind::Rest).unwrap();
        assert_eq!(plan.intent, ActionType::Rest);
    }

    #[test]
    fn work_rejects_without_construction() {
        let obs = observation(100, 0);
        let err = plan_deterministic_action(&obs, NudgeKind::Work).unwrap_err();
        assert_eq!(err.reason_code, ReasonCode::ConstraintViolation);
        assert!(err.reason.contains("No active construction"));
    }

    #[test]
    fn build_maps_to_do_work_on_existing_construction() {
        let mut obs = observation(100, 0);
        let mut uc = plot(0, Zone::Residential, PlotStatus::UnderConstruction, 2);
        uc.owner = Some(obs.self_view.id);
        let plot_id = uc.id;
        obs.my_plots = vec![uc];

        let plan = plan_deterministic_action(&obs, NudgeKind::Build).unwrap();
        assert_eq!(plan.intent, ActionType::DoWork);
        assert_eq!(
            plan.params,
            ActionParams::DoWork {
                plot_id: Some(plot_id),
                plot_index: Some(0),
            }
        );
    }

    #[test]
    fn build_bootstrap_rejects_when_broke() {
        let mut obs = observation(1, 0);
        obs.available_plots = vec![plot(2, Zone::Commercial, PlotStatus::Empty, 0)];

        let err = plan_deterministic_action(&obs, NudgeKind::Build).unwrap_err();
        assert_eq!(err.reason_code, ReasonCode::InsufficientArena);
        assert!(err.reason.starts_with("Need about"));
    }

    #[test]
    fn build_rejects_without_claimable_plot() {
        let obs = observation(500, 0);
        let err = plan_deterministic_action(&obs, NudgeKind::Build).unwrap_err();
        assert_eq!(err.reason_code, ReasonCode::TargetUnavailable);
    }

    #[test]
    fn trade_buys_with_idle_reserve() {
        let obs = observation(100, 50);
        let plan = plan_deterministic_action(&obs, NudgeKind::Trade).unwrap();
        assert_eq!(plan.intent, ActionType::BuyArena);
        match plan.params {
            ActionParams::BuyArena { amount_in, next_action, .. } => {
                assert_eq!(amount_in, 50);
                assert_eq!(next_action.as_deref(), Some("play_arena"));
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn trade_sells_excess_bankroll() {
        let obs = observation(210, 5);
        let plan = plan_deterministic_action(&obs, NudgeKind::Trade).unwrap();
        assert_eq!(plan.intent, ActionType::SellArena);
        match plan.params {
            ActionParams::SellArena { amount_in, next_action, .. } => {
                assert_eq!(amount_in, 80);
                assert_eq!(next_action.as_deref(), Some("start_build"));
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn trade_rejects_when_neither_rotation_fits() {
        let obs = observation(30, 5);
        let err = plan_deterministic_action(&obs, NudgeKind::Trade).unwrap_err();
        assert_eq!(err.reason_code, ReasonCode::ConstraintViolation);
    }

    #[test]
    fn fight_uses_wheel_window_when_open() {
        let mut obs = observation(100, 0);
        obs.wheel.phase = townforge_types::WheelPhase::Announcing;
        obs.wheel.game_type = Some(GameType::Dice);
        obs.wheel.wager = Some(40);

        let plan = plan_deterministic_action(&obs, NudgeKind::Fight).unwrap();
        match plan.params {
            ActionParams::PlayArena { game_type, wager, .. } => {
                assert_eq!(game_type, Some(GameType::Dice));
                assert_eq!(wager, Some(40));
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn planning_is_pure() {
        let mut obs = observation(100, 50);
        obs.available_plots = vec![plot(1, Zone::Civic, PlotStatus::Empty, 0)];
        let a = plan_deterministic_action(&obs, NudgeKind::Build).unwrap();
        let b = plan_deterministic_action(&obs, NudgeKind::Build).unwrap();
        assert_eq!(a, b);
    }
}
