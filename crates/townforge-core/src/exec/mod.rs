//! The execution dispatcher: validate, coerce, redirect, and apply each
//! action against the collaborators.
//!
//! Execution runs in one of two modes. **Lenient** (the default) prefers
//! redirects: an unaffordable claim becomes a swap or a rest, a premature
//! completion becomes another work step, and the returned outcome carries
//! the action that actually ran. **Strict** (forced commands) never
//! redirects; unmet preconditions surface as explicit reason codes.
//!
//! Handlers return [`Step::Done`] with a terminal outcome or
//! [`Step::Redirect`] with a replacement action; the dispatcher loops
//! redirects up to a small depth cap. Collaborator failures bubble as
//! errors and trigger the fumble tax before being reified into a failed
//! outcome.

mod arena;
mod plots;
mod rest;
mod skill;
mod trade;

use tracing::{debug, warn};
use townforge_types::{Action, ActionType, AgentProfile, Observation, ReasonCode};

use crate::error::CoreError;
use crate::hooks;
use crate::services::Services;
use crate::state::EngineState;

/// Redirect chains longer than this settle into rest.
const MAX_REDIRECTS: u32 = 3;

/// Everything a handler needs to execute one action.
pub struct ExecCtx<'a> {
    /// Collaborator bundle.
    pub services: &'a Services,
    /// Process-scoped engine state.
    pub state: &'a EngineState,
    /// The acting agent's pre-execution snapshot.
    pub profile: &'a AgentProfile,
    /// The tick's observation snapshot.
    pub observation: &'a Observation,
    /// The tick number.
    pub tick: u64,
    /// Whether execution is strict (no redirects).
    pub strict: bool,
}

/// The terminal result of executing one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    /// The action that actually ran (post-redirect).
    pub action: Action,
    /// Whether it succeeded.
    pub success: bool,
    /// Narrative outcome line.
    pub narrative: String,
    /// Net $ARENA spent (negative when the action earned).
    pub cost: i64,
    /// Failure reason code, when `success` is false.
    pub reason: Option<ReasonCode>,
    /// Failure detail, when `success` is false.
    pub error: Option<String>,
}

impl ExecOutcome {
    /// A successful outcome.
    pub fn done(action: Action, narrative: impl Into<String>, cost: i64) -> Self {
        Self {
            action,
            success: true,
            narrative: narrative.into(),
            cost,
            reason: None,
            error: None,
        }
    }

    /// A failed outcome with a reason code.
    pub fn failed(action: Action, reason: ReasonCode, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            action,
            success: false,
            narrative: format!("Could not act: {error}"),
            cost: 0,
            reason: Some(reason),
            error: Some(error),
        }
    }
}

/// A handler's verdict: finished, or replaced by another action.
pub(crate) enum Step {
    /// Terminal outcome.
    Done(ExecOutcome),
    /// Replace the action and dispatch again.
    Redirect(Action),
}

/// Failure codes that represent caught execution errors and therefore
/// attract the fumble tax.
const fn taxable(code: ReasonCode) -> bool {
    matches!(
        code,
        ReasonCode::ExecutionError
            | ReasonCode::ExecutionFailed
            | ReasonCode::MatchCreateFailed
            | ReasonCode::MatchTimeout
    )
}

/// Execute an action to completion, following redirects.
pub async fn execute(ctx: &ExecCtx<'_>, action: Action) -> ExecOutcome {
    // Common precondition: incapacitated agents may only rest.
    if ctx.profile.is_incapacitated() && action.action_type != ActionType::Rest {
        if ctx.strict {
            return ExecOutcome::failed(
                action,
                ReasonCode::AgentIncapacitated,
                "agent is incapacitated and may only rest",
            );
        }
        let rested = action.redirect(townforge_types::ActionParams::Rest, "incapacitated");
        return ExecOutcome::done(rested, "Too hurt to do anything but rest.", 0);
    }

    // Common precondition: mid-match agents only touch the match.
    if ctx.profile.is_in_match && action.action_type != ActionType::PlayArena {
        if ctx.strict {
            return ExecOutcome::failed(
                action,
                ReasonCode::ConstraintViolation,
                "agent is mid-match",
            );
        }
        let rested = action.redirect(townforge_types::ActionParams::Rest, "mid-match");
        return ExecOutcome::done(rested, "Locked in a match; sitting tight.", 0);
    }

    // Common precondition: everything except rest needs an active town.
    if ctx.observation.town.is_none() && action.action_type != ActionType::Rest {
        if ctx.strict {
            return ExecOutcome::failed(action, ReasonCode::NoTown, "no active town");
        }
        let rested = action.redirect(townforge_types::ActionParams::Rest, "no active town");
        return ExecOutcome::done(rested, "No active town to act in; resting.", 0);
    }

    let mut current = action;
    for depth in 0..=MAX_REDIRECTS {
        match dispatch_one(ctx, current.clone()).await {
            Ok(Step::Done(outcome)) => {
                if let Some(code) = outcome.reason.filter(|c| taxable(*c)) {
                    apply_tax(ctx, code).await;
                }
                return outcome;
            }
            Ok(Step::Redirect(next)) => {
                debug!(
                    agent_id = %ctx.profile.id,
                    tick = ctx.tick,
                    from = current.action_type.as_str(),
                    to = next.action_type.as_str(),
                    depth,
                    "execution redirect"
                );
                current = next;
            }
            Err(err) => {
                warn!(
                    agent_id = %ctx.profile.id,
                    tick = ctx.tick,
                    action_type = current.action_type.as_str(),
                    error = %err,
                    "execution threw, applying fumble tax"
                );
                apply_tax(ctx, ReasonCode::ExecutionError).await;
                return ExecOutcome::failed(current, ReasonCode::ExecutionError, err.to_string());
            }
        }
    }

    // Redirect chain never settled; rest is always safe.
    ExecOutcome::done(
        current.redirect(townforge_types::ActionParams::Rest, "redirect chain exhausted"),
        "Circled the options and settled down to rest.",
        0,
    )
}

/// Dispatch one action to its handler.
async fn dispatch_one(ctx: &ExecCtx<'_>, action: Action) -> Result<Step, CoreError> {
    match action.action_type {
        ActionType::ClaimPlot => plots::claim_plot(ctx, action).await,
        ActionType::StartBuild => plots::start_build(ctx, action).await,
        ActionType::DoWork => plots::do_work(ctx, action).await,
        ActionType::CompleteBuild => plots::complete_build(ctx, action).await,
        ActionType::BuyArena | ActionType::SellArena => trade::swap(ctx, action).await,
        ActionType::TransferArena => trade::transfer(ctx, action).await,
        ActionType::PlayArena => arena::play(ctx, action).await,
        ActionType::BuySkill => skill::buy(ctx, action).await,
        ActionType::Mine => rest::mine(ctx, &action),
        ActionType::Rest => Ok(rest::rest(ctx, action)),
    }
}

/// Best-effort fumble tax; its own failures only warn.
async fn apply_tax(ctx: &ExecCtx<'_>, code: ReasonCode) {
    if let Err(err) = hooks::apply_fumble_tax(ctx.services, ctx.profile.id).await {
        warn!(
            agent_id = %ctx.profile.id,
            reason = %code,
            error = %err,
            "fumble tax could not be applied"
        );
    }
}
