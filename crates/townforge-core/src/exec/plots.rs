//! Handlers for the land-and-buildings actions: claim, start, work,
//! complete.

use tracing::{debug, warn};
use townforge_types::{
    Action, ActionParams, EventKind, Observation, PlotId, PlotStatus, PlotView, ReasonCode,
};

use townforge_economy::{
    build_cost, claim_cost, completion_bonus, work_wage, SOLVENCY_POOL_FLOOR,
};
use townforge_services::{
    AgentStore, BuildingVisuals, ChatMessage, ModelGateway, PoolStore, TownService,
};

use super::{ExecCtx, ExecOutcome, Step};
use crate::error::CoreError;

/// $ARENA paid on completion while a construction bounty world event is
/// active.
const CONSTRUCTION_BOUNTY_ARENA: i64 = 10;

/// Reserve needed before a redirect-to-buy makes sense.
const REDIRECT_BUY_MIN_RESERVE: i64 = 10;

// ---------------------------------------------------------------------------
// claim_plot
// ---------------------------------------------------------------------------

/// Claim an empty plot, redirecting around missing funds in lenient mode.
pub(super) async fn claim_plot(ctx: &ExecCtx<'_>, action: Action) -> Result<Step, CoreError> {
    let plot_index = match &action.params {
        ActionParams::ClaimPlot { plot_index } => *plot_index,
        _ => None,
    };

    let Some(index) = plot_index else {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::InvalidPlotIndex,
                "claim_plot requires a plot index",
            )));
        }
        return Ok(Step::Redirect(
            action.redirect(ActionParams::Rest, "no plot index given"),
        ));
    };

    let obs = ctx.observation;
    let (town_id, level, claimed) = town_figures(obs);
    let bootstrap = obs.my_plots.is_empty();
    let cost = claim_cost(level, claimed, bootstrap);

    if ctx.profile.bankroll < cost {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::InsufficientArena,
                format!("claim needs about {cost} $ARENA"),
            )));
        }
        return Ok(Step::Redirect(redirect_for_funds(ctx, &action, "claim unaffordable")));
    }

    if !obs.available_plots.iter().any(|p| p.index == index) {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::TargetUnavailable,
                format!("plot {index} is not claimable"),
            )));
        }
        return Ok(Step::Redirect(
            action.redirect(ActionParams::Rest, "target plot not claimable"),
        ));
    }

    let plot = ctx
        .services
        .towns
        .claim_plot(ctx.profile.id, town_id, index)
        .await?;

    let narrative = format!(
        "Claimed plot {index} ({:?}) for about {cost} $ARENA.",
        plot.zone
    );
    let _ = ctx
        .services
        .towns
        .log_event(
            town_id,
            EventKind::PlotClaimed,
            "Plot claimed",
            &format!("{} claimed plot {index}", ctx.profile.name),
            Some(ctx.profile.id),
            serde_json::json!({ "plotIndex": index, "cost": cost }),
        )
        .await;

    Ok(Step::Done(ExecOutcome::done(action, narrative, cost)))
}

// ---------------------------------------------------------------------------
// start_build
// ---------------------------------------------------------------------------

/// Start a build, resolving the target plot through four fallbacks.
pub(super) async fn start_build(ctx: &ExecCtx<'_>, action: Action) -> Result<Step, CoreError> {
    let (building_type, plot_id, plot_index) = match &action.params {
        ActionParams::StartBuild {
            building_type,
            plot_id,
            plot_index,
        } => (building_type.clone(), *plot_id, *plot_index),
        _ => (String::from("modest structure"), None, None),
    };

    let obs = ctx.observation;
    let (town_id, level, claimed) = town_figures(obs);
    let bootstrap = obs.my_plots.is_empty();

    // Resolve: explicit id/index, own claimed plot, or any available plot.
    let target = find_plot(obs, plot_id, plot_index)
        .or_else(|| obs.claimed_idle().first().copied())
        .or_else(|| obs.available_plots.iter().min_by_key(|p| p.index));

    let Some(target) = target.cloned() else {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::NoClaimedPlot,
                "no plot to build on",
            )));
        }
        return Ok(Step::Redirect(
            action.redirect(ActionParams::Rest, "no plot to build on"),
        ));
    };

    // Already building here: keep the momentum instead.
    if target.is_under_construction() && target.owner == Some(ctx.profile.id) {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::TargetUnavailable,
                format!("plot {} is already under construction", target.index),
            )));
        }
        return Ok(Step::Redirect(action.redirect(
            ActionParams::DoWork {
                plot_id: Some(target.id),
                plot_index: Some(target.index),
            },
            "target already under construction",
        )));
    }

    let cost = build_cost(target.zone, level, obs.world.cost_multiplier, bootstrap);
    let mut total = cost;
    let needs_claim = matches!(target.status, PlotStatus::Empty);
    if needs_claim {
        total = total.saturating_add(claim_cost(level, claimed, bootstrap));
    }

    if ctx.profile.bankroll < total {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::InsufficientArena,
                format!("build needs about {total} $ARENA"),
            )));
        }
        // Underfunded build: swap reserve in, else earn a wage on an
        // existing construction, else rest.
        if ctx.profile.reserve_balance < REDIRECT_BUY_MIN_RESERVE
            && let Some(uc) = obs.under_construction().first()
        {
            return Ok(Step::Redirect(action.redirect(
                ActionParams::DoWork {
                    plot_id: Some(uc.id),
                    plot_index: Some(uc.index),
                },
                "build unaffordable; earning a wage instead",
            )));
        }
        return Ok(Step::Redirect(redirect_for_funds(ctx, &action, "build unaffordable")));
    }

    // Auto-claim an empty target first.
    let resolved = if needs_claim {
        ctx.services
            .towns
            .claim_plot(ctx.profile.id, town_id, target.index)
            .await?
    } else {
        target
    };

    let plot = ctx
        .services
        .towns
        .start_build(ctx.profile.id, resolved.id, &building_type, cost)
        .await?;

    let narrative = format!(
        "Broke ground on '{building_type}' at plot {} for {cost} $ARENA.",
        plot.index
    );
    let _ = ctx
        .services
        .towns
        .log_event(
            town_id,
            EventKind::BuildStarted,
            "Build started",
            &format!("{} started '{building_type}' on plot {}", ctx.profile.name, plot.index),
            Some(ctx.profile.id),
            serde_json::json!({ "plotIndex": plot.index, "cost": cost }),
        )
        .await;

    Ok(Step::Done(ExecOutcome::done(action, narrative, total)))
}

// ---------------------------------------------------------------------------
// do_work
// ---------------------------------------------------------------------------

/// Submit one model-drafted design step and collect the work wage.
pub(super) async fn do_work(ctx: &ExecCtx<'_>, action: Action) -> Result<Step, CoreError> {
    let (plot_id, plot_index) = match &action.params {
        ActionParams::DoWork { plot_id, plot_index } => (*plot_id, *plot_index),
        _ => (None, None),
    };

    let obs = ctx.observation;
    let (town_id, level, _) = town_figures(obs);

    // Resolve: explicit target, else the most advanced construction.
    let target = find_plot(obs, plot_id, plot_index)
        .filter(|p| p.is_under_construction() && p.owner == Some(ctx.profile.id))
        .or_else(|| obs.under_construction().first().copied())
        .cloned();

    let Some(plot) = target else {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::NoClaimedPlot,
                "no construction to work on",
            )));
        }
        // Auto-chain: start on a claimed plot, or claim one first.
        if let Some(idle) = obs.claimed_idle().first() {
            return Ok(Step::Redirect(action.redirect(
                ActionParams::StartBuild {
                    building_type: townforge_policy::default_building_concept(idle.zone)
                        .to_owned(),
                    plot_id: Some(idle.id),
                    plot_index: Some(idle.index),
                },
                "no construction; starting one",
            )));
        }
        if !obs.available_plots.is_empty() {
            let index = obs.available_plots.iter().map(|p| p.index).min();
            return Ok(Step::Redirect(action.redirect(
                ActionParams::ClaimPlot { plot_index: index },
                "no plots; claiming first",
            )));
        }
        return Ok(Step::Redirect(
            action.redirect(ActionParams::Rest, "nothing to work on"),
        ));
    };

    let step_number = plot.work_steps.saturating_add(1);
    let prose = draft_work_step(ctx, &plot, step_number).await?;

    let updated = ctx
        .services
        .towns
        .submit_work(ctx.profile.id, plot.id, &prose)
        .await?;

    // First step: pull a building name out of the prose and persist it.
    if plot.work_steps == 0
        && let Some(name) = extract_building_name(&prose)
    {
        if let Err(err) = ctx.services.towns.set_building_name(plot.id, &name).await {
            warn!(plot_index = plot.index, error = %err, "building name not persisted");
        }
    }

    // Work wage, funded only while the pool stays above its floor.
    let basis = plot
        .build_cost
        .unwrap_or_else(|| build_cost(plot.zone, level, obs.world.cost_multiplier, false));
    let wage = work_wage(basis, plot.zone);
    let paid = if ctx
        .services
        .pool
        .debit_arena_above_floor(wage, SOLVENCY_POOL_FLOOR)
        .await?
    {
        ctx.services.agents.credit_bankroll(ctx.profile.id, wage).await?;
        wage
    } else {
        debug!(agent_id = %ctx.profile.id, wage, "work wage skipped, pool at floor");
        0
    };

    let narrative = format!(
        "Logged work step {step_number}/{} on plot {}{}.",
        updated.zone.min_work_steps(),
        updated.index,
        if paid > 0 {
            format!(", earned {paid} $ARENA")
        } else {
            String::new()
        }
    );
    let _ = ctx
        .services
        .towns
        .log_event(
            town_id,
            EventKind::WorkSubmitted,
            "Work submitted",
            &format!("{} advanced plot {}", ctx.profile.name, updated.index),
            Some(ctx.profile.id),
            serde_json::json!({ "plotIndex": updated.index, "step": step_number }),
        )
        .await;

    Ok(Step::Done(ExecOutcome::done(action, narrative, paid.saturating_neg())))
}

// ---------------------------------------------------------------------------
// complete_build
// ---------------------------------------------------------------------------

/// Complete a finished build: bonus, visual, quality judging, bounty.
pub(super) async fn complete_build(ctx: &ExecCtx<'_>, action: Action) -> Result<Step, CoreError> {
    let (plot_id, plot_index) = match &action.params {
        ActionParams::CompleteBuild { plot_id, plot_index } => (*plot_id, *plot_index),
        _ => (None, None),
    };

    let obs = ctx.observation;
    let (town_id, level, _) = town_figures(obs);

    let target = find_plot(obs, plot_id, plot_index)
        .filter(|p| p.is_under_construction() && p.owner == Some(ctx.profile.id))
        .or_else(|| obs.ready_to_complete())
        .or_else(|| obs.under_construction().first().copied())
        .cloned();

    let Some(plot) = target else {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::NoActiveBuild,
                "no construction to complete",
            )));
        }
        return Ok(Step::Redirect(
            action.redirect(ActionParams::Rest, "nothing to complete"),
        ));
    };

    // Not enough steps yet: keep working instead.
    if plot.work_steps < plot.zone.min_work_steps() {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::NotReady,
                format!(
                    "plot {} has {}/{} work steps",
                    plot.index,
                    plot.work_steps,
                    plot.zone.min_work_steps()
                ),
            )));
        }
        return Ok(Step::Redirect(action.redirect(
            ActionParams::DoWork {
                plot_id: Some(plot.id),
                plot_index: Some(plot.index),
            },
            "build not ready",
        )));
    }

    let completed = ctx
        .services
        .towns
        .complete_build(ctx.profile.id, plot.id)
        .await?;

    // Completion bonus under the pool floor guard.
    let basis = plot
        .build_cost
        .unwrap_or_else(|| build_cost(plot.zone, level, obs.world.cost_multiplier, false));
    let bonus = completion_bonus(basis);
    let mut earned = 0_i64;
    if ctx
        .services
        .pool
        .debit_arena_above_floor(bonus, SOLVENCY_POOL_FLOOR)
        .await?
    {
        ctx.services
            .agents
            .credit_bankroll(ctx.profile.id, bonus)
            .await?;
        earned = bonus;
    }

    let building = completed
        .building_name
        .clone()
        .or_else(|| completed.building_type.clone())
        .unwrap_or_else(|| String::from("the building"));

    // Visual selection is best-effort and never fails the completion.
    if let Err(err) = ctx
        .services
        .visuals
        .select_visual(completed.id, &building, &ctx.profile.name)
        .await
    {
        warn!(plot_index = completed.index, error = %err, "visual selection failed");
    }

    // Quality judging is best-effort: score 1-10, yield delta -3..+3.
    match judge_quality(ctx, &completed).await {
        Ok(score) => {
            let delta = yield_delta(score);
            if delta != 0
                && let Err(err) = ctx.services.towns.adjust_plot_yield(completed.id, delta).await
            {
                warn!(plot_index = completed.index, error = %err, "yield adjustment failed");
            }
        }
        Err(err) => {
            warn!(plot_index = completed.index, error = %err, "quality judging failed");
        }
    }

    // Construction bounty while a bounty world event is live.
    let bounty_live = obs
        .world_events
        .iter()
        .any(|e| e.name.to_lowercase().contains("bounty"));
    if bounty_live
        && ctx
            .services
            .pool
            .debit_arena_above_floor(CONSTRUCTION_BOUNTY_ARENA, SOLVENCY_POOL_FLOOR)
            .await?
    {
        ctx.services
            .agents
            .credit_bankroll(ctx.profile.id, CONSTRUCTION_BOUNTY_ARENA)
            .await?;
        earned = earned.saturating_add(CONSTRUCTION_BOUNTY_ARENA);
    }

    let narrative = format!(
        "Completed '{building}' on plot {}{}.",
        completed.index,
        if earned > 0 {
            format!(", collected {earned} $ARENA")
        } else {
            String::new()
        }
    );
    let _ = ctx
        .services
        .towns
        .log_event(
            town_id,
            EventKind::BuildCompleted,
            "Build completed",
            &format!("{} completed '{building}' on plot {}", ctx.profile.name, completed.index),
            Some(ctx.profile.id),
            serde_json::json!({ "plotIndex": completed.index, "bonus": earned }),
        )
        .await;

    Ok(Step::Done(ExecOutcome::done(action, narrative, earned.saturating_neg())))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Town id, level, and claimed-plot count from the observation.
///
/// Callers run behind the active-town precondition, so the fallbacks
/// only cover the degenerate snapshot in tests.
fn town_figures(obs: &Observation) -> (townforge_types::TownId, u32, u32) {
    obs.town.as_ref().map_or_else(
        || (townforge_types::TownId::new(), 1, 0),
        |t| (t.id, t.level, t.plots_claimed),
    )
}

/// Find a plot by id or index across owned and available plots.
fn find_plot<'a>(
    obs: &'a Observation,
    plot_id: Option<PlotId>,
    plot_index: Option<u32>,
) -> Option<&'a PlotView> {
    obs.my_plots
        .iter()
        .chain(obs.available_plots.iter())
        .find(|p| {
            plot_id.is_some_and(|id| p.id == id)
                || (plot_id.is_none() && plot_index.is_some_and(|i| p.index == i))
        })
}

/// Pick the lenient redirect for an unaffordable spend: swap reserve in
/// when there is reserve to swap, otherwise rest.
fn redirect_for_funds(ctx: &ExecCtx<'_>, action: &Action, why: &str) -> Action {
    if ctx.profile.reserve_balance >= REDIRECT_BUY_MIN_RESERVE {
        action.redirect(
            ActionParams::BuyArena {
                amount_in: ctx.profile.reserve_balance,
                why: Some(String::from("cover an unaffordable action")),
                next_action: Some(action.action_type.as_str().to_owned()),
            },
            why,
        )
    } else {
        action.redirect(ActionParams::Rest, why)
    }
}

/// Ask the model for a 100-300 word design step.
async fn draft_work_step(
    ctx: &ExecCtx<'_>,
    plot: &PlotView,
    step_number: u32,
) -> Result<String, CoreError> {
    let building = plot
        .building_name
        .clone()
        .or_else(|| plot.building_type.clone())
        .unwrap_or_else(|| String::from("the building"));
    let spec = ctx
        .services
        .gateway
        .get_model_spec(&ctx.profile.model_id)
        .await?;
    let temperature = ctx.services.gateway.temperature_for(ctx.profile.archetype);
    let messages = [
        ChatMessage::system(
            "You are the site architect for a frontier town. Write vivid, concrete \
             construction journal entries.",
        ),
        ChatMessage::user(format!(
            "Write design step {step_number} for '{building}' on plot {} ({:?} zone). \
             100-300 words of prose describing the work done this step. If this is step 1, \
             open by naming the building in double quotes.",
            plot.index, plot.zone
        )),
    ];
    let reply = ctx
        .services
        .gateway
        .call_model(&spec, &messages, temperature, true)
        .await?;
    Ok(reply.content)
}

/// Extract a building name from the first work step's prose: the first
/// double-quoted phrase of sane length.
pub(crate) fn extract_building_name(prose: &str) -> Option<String> {
    let start = prose.find('"')?;
    let rest = prose.get(start.saturating_add(1)..)?;
    let end = rest.find('"')?;
    let name = rest.get(..end)?.trim();
    if name.is_empty() || name.len() > 60 {
        return None;
    }
    Some(name.to_owned())
}

/// Ask the model judge for a 1-10 quality score.
async fn judge_quality(ctx: &ExecCtx<'_>, plot: &PlotView) -> Result<u32, CoreError> {
    let building = plot
        .building_name
        .clone()
        .or_else(|| plot.building_type.clone())
        .unwrap_or_else(|| String::from("the building"));
    let spec = ctx
        .services
        .gateway
        .get_model_spec(&ctx.profile.model_id)
        .await?;
    let messages = [
        ChatMessage::system("You are a strict architecture judge. Respond with a single integer."),
        ChatMessage::user(format!(
            "Score the completed building '{building}' ({:?} zone, {} work steps) from 1 to 10.",
            plot.zone, plot.work_steps
        )),
    ];
    let reply = ctx
        .services
        .gateway
        .call_model(&spec, &messages, 0.2, true)
        .await?;
    Ok(parse_score(&reply.content))
}

/// First integer in the judge's reply, clamped to 1..=10 (default 5).
pub(crate) fn parse_score(reply: &str) -> u32 {
    reply
        .split(|c: char| !c.is_ascii_digit())
        .find(|chunk| !chunk.is_empty())
        .and_then(|chunk| chunk.parse::<u32>().ok())
        .map_or(5, |n| n.clamp(1, 10))
}

/// Map a 1-10 quality score onto a yield delta of -3..=+3.
pub(crate) const fn yield_delta(score: u32) -> i32 {
    match score {
        0 | 1 => -3,
        2 => -2,
        3 | 4 => -1,
        5 | 6 => 0,
        7 | 8 => 1,
        9 => 2,
        _ => 3,
    }
}
