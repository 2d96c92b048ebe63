//! The `rest` handler (with its anti-stall redirects) and the legacy
//! `mine` redirect.

use townforge_types::{Action, ActionParams};

use townforge_economy::{claim_cost, ARENA_MIN_BANKROLL};
use townforge_policy::default_building_concept;

use super::{ExecCtx, ExecOutcome, Step};

/// Reserve needed before resting converts into a funding swap.
const REST_BUY_MIN_RESERVE: i64 = 10;

/// Execute (or redirect) a rest.
///
/// A resting agent with something actionable on the board is stalled,
/// not resting: lenient mode steers toward the wheel, the build ladder,
/// or an initial claim. Strict mode (a forced rest) always rests.
pub(super) fn rest(ctx: &ExecCtx<'_>, action: Action) -> Step {
    if ctx.strict || ctx.profile.is_incapacitated() {
        return Step::Done(ExecOutcome::done(action, resting_narrative(ctx), 0));
    }

    let obs = ctx.observation;

    // A live duel window beats sitting idle.
    if obs.wheel.is_fight_window() && !obs.wheel.is_queued(ctx.profile.id) {
        if ctx.profile.bankroll >= ARENA_MIN_BANKROLL {
            return Step::Redirect(action.redirect(
                ActionParams::PlayArena {
                    game_type: obs.wheel.game_type,
                    wager: obs.wheel.wager,
                    opponent: None,
                },
                "wheel duel window open",
            ));
        }
        if ctx.profile.reserve_balance >= REST_BUY_MIN_RESERVE {
            return Step::Redirect(action.redirect(
                ActionParams::BuyArena {
                    amount_in: ctx.profile.reserve_balance,
                    why: Some(String::from("fund the wheel duel")),
                    next_action: Some(String::from("play_arena")),
                },
                "funding the duel",
            ));
        }
    }

    // The build ladder.
    if let Some(plot) = obs.under_construction().first() {
        return Step::Redirect(action.redirect(
            ActionParams::DoWork {
                plot_id: Some(plot.id),
                plot_index: Some(plot.index),
            },
            "construction is waiting",
        ));
    }
    if let Some(plot) = obs.claimed_idle().first() {
        return Step::Redirect(action.redirect(
            ActionParams::StartBuild {
                building_type: default_building_concept(plot.zone).to_owned(),
                plot_id: Some(plot.id),
                plot_index: Some(plot.index),
            },
            "claimed plot is idle",
        ));
    }
    if obs.my_plots.is_empty()
        && let Some(plot) = obs.available_plots.iter().min_by_key(|p| p.index)
    {
        let (level, claimed) = obs
            .town
            .as_ref()
            .map_or((1, 0), |t| (t.level, t.plots_claimed));
        if ctx.profile.bankroll >= claim_cost(level, claimed, true) {
            return Step::Redirect(action.redirect(
                ActionParams::ClaimPlot {
                    plot_index: Some(plot.index),
                },
                "land is claimable",
            ));
        }
    }

    Step::Done(ExecOutcome::done(action, resting_narrative(ctx), 0))
}

/// Legacy `mine`: always redirected, never executed.
pub(super) fn mine(
    ctx: &ExecCtx<'_>,
    action: &Action,
) -> Result<Step, crate::error::CoreError> {
    let target = ctx.observation.under_construction().first().map(|p| (p.id, p.index));
    Ok(match target {
        Some((plot_id, index)) => Step::Redirect(action.redirect(
            ActionParams::DoWork {
                plot_id: Some(plot_id),
                plot_index: Some(index),
            },
            "mining retired; working the build instead",
        )),
        None => Step::Redirect(
            action.redirect(ActionParams::Rest, "mining retired; nothing to work"),
        ),
    })
}

/// Flavor line for a genuine rest.
fn resting_narrative(ctx: &ExecCtx<'_>) -> String {
    if ctx.profile.is_incapacitated() {
        format!("{} is laid up, recovering.", ctx.profile.name)
    } else {
        format!("{} takes the tick off, watching the town.", ctx.profile.name)
    }
}
