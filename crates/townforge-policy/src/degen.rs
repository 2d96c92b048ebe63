//! The degen-loop policy: deterministic action synthesis without any
//! model call.
//!
//! Agents in `DEGEN_LOOP` mode run this closed-form function every tick.
//! Rules are evaluated in strict priority order (most urgent first); the
//! function always returns an action, so a degen agent can never stall a
//! tick waiting for a model.

use tracing::debug;
use townforge_types::{Action, ActionParams, GameType, NudgeKind, Observation};

use townforge_economy::{claim_cost, ARENA_MIN_BANKROLL, DEFAULT_ARENA_WAGER};

use crate::concept::default_building_concept;
use crate::planner::{
    TRADE_BUY_MAX_BANKROLL, TRADE_BUY_MIN_RESERVE, TRADE_SELL_KEEP, TRADE_SELL_MIN_AMOUNT,
    TRADE_SELL_MIN_BANKROLL,
};

/// Produce the degen-loop action for this tick.
///
/// # Rules (in priority order)
///
/// 1. **Wheel fight**: a duel window is open, the agent is free and
///    funded -- queue for it.
/// 2. **Explicit nudge**: a queued human instruction steers the loop.
/// 3. **Complete ready build**: a build with enough work steps exists.
/// 4. **Continue active build**: work the most advanced construction.
/// 5. **Start claimed plot**: break ground on an idle claim.
/// 6. **Bootstrap claim**: claim a first plot, but only on an explicit
///    `build` nudge -- the loop does not speculate on land.
/// 7. **Profit rotation**: swap idle reserve in or excess bankroll out.
/// 8. **Idle hold**: rest.
pub fn degen_action(observation: &Observation, nudge: Option<NudgeKind>) -> Action {
    let agent_id = observation.self_view.id;

    // Rule 1: active wheel fight.
    if let Some(action) = try_wheel_fight(observation) {
        debug!(agent_id = %agent_id, rule = "wheel_fight", "degen loop: queueing for duel");
        return action;
    }

    // Rule 2: explicit nudge.
    if let Some(kind) = nudge
        && let Some(action) = try_nudge(observation, kind)
    {
        debug!(agent_id = %agent_id, rule = "nudge", nudge = ?kind, "degen loop: following nudge");
        return action;
    }

    // Rules 3-5: build ladder.
    if let Some(action) = try_build_ladder(observation) {
        return action;
    }

    // Rule 6: bootstrap claim, gated on an explicit build nudge.
    if nudge == Some(NudgeKind::Build)
        && let Some(action) = try_bootstrap_claim(observation)
    {
        debug!(agent_id = %agent_id, rule = "bootstrap_claim", "degen loop: claiming first plot");
        return action;
    }

    // Rule 7: profit rotation.
    if let Some(action) = try_profit_rotation(observation) {
        debug!(agent_id = %agent_id, rule = "profit_rotation", "degen loop: rotating balances");
        return action;
    }

    // Rule 8: idle hold.
    Action::rest("Nothing on the board worth a move; holding")
}

/// Rule 1: queue for an open wheel duel if free and funded.
fn try_wheel_fight(observation: &Observation) -> Option<Action> {
    let wheel = &observation.wheel;
    if !wheel.is_fight_window()
        || observation.self_view.is_in_match
        || wheel.is_queued(observation.self_view.id)
        || observation.self_view.bankroll < ARENA_MIN_BANKROLL
    {
        return None;
    }
    Some(Action::new(
        ActionParams::PlayArena {
            game_type: wheel.game_type.or(Some(GameType::Poker)),
            wager: wheel.wager.or(Some(DEFAULT_ARENA_WAGER)),
            opponent: None,
        },
        "The wheel is calling; taking the duel",
    ))
}

/// Rule 2: steer by an explicit instruction nudge.
fn try_nudge(observation: &Observation, kind: NudgeKind) -> Option<Action> {
    match kind {
        NudgeKind::Rest => Some(Action::rest("Told to sit this one out")),
        NudgeKind::Fight => {
            if observation.self_view.is_in_match
                || observation.self_view.bankroll < ARENA_MIN_BANKROLL
            {
                return None;
            }
            Some(Action::new(
                ActionParams::PlayArena {
                    game_type: Some(GameType::Poker),
                    wager: Some(DEFAULT_ARENA_WAGER),
                    opponent: None,
                },
                "Told to fight; finding a table",
            ))
        }
        NudgeKind::Work => observation.under_construction().first().map(|plot| {
            Action::new(
                ActionParams::DoWork {
                    plot_id: Some(plot.id),
                    plot_index: Some(plot.index),
                },
                "Told to work; continuing the build",
            )
        }),
        NudgeKind::Build => try_build_ladder(observation).or_else(|| try_bootstrap_claim(observation)),
        NudgeKind::Trade => try_profit_rotation(observation),
    }
}

/// Rules 3-5: the build ladder (complete, continue, start).
fn try_build_ladder(observation: &Observation) -> Option<Action> {
    if let Some(plot) = observation.ready_to_complete() {
        return Some(Action::new(
            ActionParams::CompleteBuild {
                plot_id: Some(plot.id),
                plot_index: Some(plot.index),
            },
            "Build has the steps it needs; cutting the ribbon",
        ));
    }

    if let Some(plot) = observation.under_construction().first() {
        return Some(Action::new(
            ActionParams::DoWork {
                plot_id: Some(plot.id),
                plot_index: Some(plot.index),
            },
            "Construction underway; keeping the momentum",
        ));
    }

    observation.claimed_idle().first().map(|plot| {
        Action::new(
            ActionParams::StartBuild {
                building_type: default_building_concept(plot.zone).to_owned(),
                plot_id: Some(plot.id),
                plot_index: Some(plot.index),
            },
            "Claimed dirt earns nothing; breaking ground",
        )
    })
}

/// Rule 6: claim a first plot when funded.
fn try_bootstrap_claim(observation: &Observation) -> Option<Action> {
    if !observation.my_plots.is_empty() {
        return None;
    }
    let mut available: Vec<_> = observation.available_plots.iter().collect();
    available.sort_by_key(|p| p.index);
    let plot = available.first()?;

    let level = observation.town.as_ref().map_or(1, |t| t.level);
    let claimed = observation.town.as_ref().map_or(0, |t| t.plots_claimed);
    if observation.self_view.bankroll < claim_cost(level, claimed, true) {
        return None;
    }
    Some(Action::new(
        ActionParams::ClaimPlot {
            plot_index: Some(plot.index),
        },
        "No land yet; claiming the cheapest plot",
    ))
}

/// Rule 7: rotate balances the same way the manual planner does.
fn try_profit_rotation(observation: &Observation) -> Option<Action> {
    let bankroll = observation.self_view.bankroll;
    let reserve = observation.self_view.reserve_balance;

    if reserve >= TRADE_BUY_MIN_RESERVE && bankroll <= TRADE_BUY_MAX_BANKROLL {
        return Some(Action::new(
            ActionParams::BuyArena {
                amount_in: reserve,
                why: Some(String::from("Idle reserve does nothing")),
                next_action: Some(String::from("play_arena")),
            },
            "Rotating reserve into chips",
        ));
    }

    if bankroll >= TRADE_SELL_MIN_BANKROLL && bankroll > TRADE_SELL_KEEP {
        let amount_in = bankroll.saturating_sub(TRADE_SELL_KEEP).max(TRADE_SELL_MIN_AMOUNT);
        return Some(Action::new(
            ActionParams::SellArena {
                amount_in,
                why: Some(String::from("Banking the run-up")),
                next_action: Some(String::from("start_build")),
            },
            "Skimming profit back to reserve",
        ));
    }
    None
}
