//! Handlers for AMM swaps and agent-to-agent transfers.

use tracing::debug;
use townforge_types::{Action, ActionParams, EventKind, ReasonCode};

use townforge_services::{AmmService, ServiceError, SwapSide, TownService};

use super::{ExecCtx, ExecOutcome, Step};
use crate::error::CoreError;

/// Execute a `buy_arena` or `sell_arena` swap.
///
/// The requested amount is clamped to the relevant balance before the
/// AMM sees it. A clamp/slippage rejection from the AMM becomes a
/// lenient "skipped" rest outcome (strict mode surfaces it).
pub(super) async fn swap(ctx: &ExecCtx<'_>, action: Action) -> Result<Step, CoreError> {
    let (side, requested) = match &action.params {
        ActionParams::BuyArena { amount_in, .. } => (SwapSide::BuyArena, *amount_in),
        ActionParams::SellArena { amount_in, .. } => (SwapSide::SellArena, *amount_in),
        _ => (SwapSide::BuyArena, 0),
    };

    let (balance, empty_code) = match side {
        SwapSide::BuyArena => (ctx.profile.reserve_balance, ReasonCode::NoReserve),
        SwapSide::SellArena => (ctx.profile.bankroll, ReasonCode::NoArena),
    };
    let amount_in = requested.min(balance);

    if amount_in <= 0 {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                empty_code,
                "nothing to swap",
            )));
        }
        return Ok(Step::Redirect(
            action.redirect(ActionParams::Rest, "nothing to swap"),
        ));
    }

    match ctx
        .services
        .amm
        .swap(ctx.profile.id, side, amount_in, None)
        .await
    {
        Ok(execution) => {
            ctx.state.note_trade(ctx.profile.id, ctx.tick);
            let narrative = format!(
                "Swapped {amount_in} for {} ({} fee {}).",
                execution.amount_out,
                side.as_str(),
                execution.fee_amount
            );
            if let Some(town) = &ctx.observation.town {
                let _ = ctx
                    .services
                    .towns
                    .log_event(
                        town.id,
                        EventKind::Swap,
                        "AMM swap",
                        &format!("{} swapped on the AMM", ctx.profile.name),
                        Some(ctx.profile.id),
                        serde_json::json!({
                            "side": side.as_str(),
                            "amountIn": amount_in,
                            "amountOut": execution.amount_out,
                        }),
                    )
                    .await;
            }
            let cost = match side {
                SwapSide::BuyArena => execution.amount_out.saturating_neg(),
                SwapSide::SellArena => amount_in,
            };
            Ok(Step::Done(ExecOutcome::done(action, narrative, cost)))
        }
        Err(ServiceError::SwapRejected { message }) => {
            debug!(agent_id = %ctx.profile.id, message, "swap clamped or slipped");
            if ctx.strict {
                return Ok(Step::Done(ExecOutcome::failed(
                    action,
                    ReasonCode::AmmSlippage,
                    message,
                )));
            }
            let rested = action.redirect(ActionParams::Rest, "swap skipped on slippage");
            Ok(Step::Done(ExecOutcome::done(
                rested,
                format!("Swap skipped: {message}."),
                0,
            )))
        }
        Err(other) => Err(other.into()),
    }
}

/// Send $ARENA to another agent, looked up by case-insensitive name.
pub(super) async fn transfer(ctx: &ExecCtx<'_>, action: Action) -> Result<Step, CoreError> {
    let (to_name, amount) = match &action.params {
        ActionParams::TransferArena { to_name, amount, .. } => (to_name.clone(), *amount),
        _ => (String::new(), 0),
    };

    if amount <= 0 {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::InvalidAmount,
                "transfer amount must be a positive integer",
            )));
        }
        return Ok(Step::Redirect(
            action.redirect(ActionParams::Rest, "bad transfer amount"),
        ));
    }

    let needle = to_name.to_lowercase();
    let Some(target) = ctx
        .observation
        .other_agents
        .iter()
        .find(|p| p.name.to_lowercase() == needle)
    else {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::TargetUnavailable,
                format!("no agent named '{to_name}'"),
            )));
        }
        return Ok(Step::Redirect(
            action.redirect(ActionParams::Rest, "transfer target unknown"),
        ));
    };

    if ctx.profile.bankroll < amount {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::InsufficientArena,
                format!("transfer needs {amount} $ARENA"),
            )));
        }
        return Ok(Step::Redirect(
            action.redirect(ActionParams::Rest, "transfer unaffordable"),
        ));
    }

    ctx.services
        .towns
        .transfer_arena(ctx.profile.id, target.id, amount)
        .await?;

    if let Some(town) = &ctx.observation.town {
        let _ = ctx
            .services
            .towns
            .log_event(
                town.id,
                EventKind::AgentTrade,
                "Transfer",
                &format!("{} sent {amount} $ARENA to {}", ctx.profile.name, target.name),
                Some(ctx.profile.id),
                serde_json::json!({ "amount": amount, "to": target.name }),
            )
            .await;
    }

    Ok(Step::Done(ExecOutcome::done(
        action,
        format!("Sent {amount} $ARENA to {}.", target.name),
        amount,
    )))
}
