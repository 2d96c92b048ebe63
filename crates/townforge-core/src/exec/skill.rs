//! The `buy_skill` handler: forward a purchase to the paid-skill oracle.

use townforge_types::{Action, ActionParams, EventKind, ReasonCode, SkillKind};

use townforge_services::{SkillOracle, SkillRequest, TownService};

use super::{ExecCtx, ExecOutcome, Step};
use crate::error::CoreError;

/// Buy a paid skill. The oracle prices and debits the purchase itself;
/// this handler only validates intent and affordability up front.
pub(super) async fn buy(ctx: &ExecCtx<'_>, action: Action) -> Result<Step, CoreError> {
    let (skill, question, why_now, expected_next_action, if_then, params) = match &action.params {
        ActionParams::BuySkill {
            skill,
            question,
            why_now,
            expected_next_action,
            if_then,
            params,
        } => (
            *skill,
            question.clone(),
            why_now.clone(),
            expected_next_action.clone(),
            if_then.clone(),
            params.clone(),
        ),
        _ => (
            SkillKind::MarketDepth,
            String::new(),
            None,
            None,
            None,
            serde_json::Value::Null,
        ),
    };

    if question.trim().is_empty() {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::InvalidIntent,
                "buy_skill requires a question",
            )));
        }
        return Ok(Step::Redirect(
            action.redirect(ActionParams::Rest, "skill purchase without a question"),
        ));
    }

    let estimate = ctx
        .services
        .skills
        .estimate_price_arena(skill, ctx.observation.pool.spot_price)
        .await?;
    if ctx.profile.bankroll < estimate {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::InsufficientArena,
                format!("skill costs about {estimate} $ARENA"),
            )));
        }
        return Ok(Step::Redirect(
            action.redirect(ActionParams::Rest, "skill unaffordable"),
        ));
    }

    let receipt = ctx
        .services
        .skills
        .buy_skill(SkillRequest {
            agent_id: ctx.profile.id,
            skill,
            question,
            why_now,
            expected_next_action,
            if_then,
            params,
        })
        .await?;

    if let Some(town) = &ctx.observation.town {
        let _ = ctx
            .services
            .towns
            .log_event(
                town.id,
                EventKind::X402Skill,
                "Skill purchased",
                &format!("{} bought a {skill:?} report", ctx.profile.name),
                Some(ctx.profile.id),
                serde_json::json!({ "skill": skill, "price": receipt.price_arena }),
            )
            .await;
    }

    Ok(Step::Done(ExecOutcome::done(
        action,
        format!(
            "Bought a {skill:?} report for {} $ARENA: {}",
            receipt.price_arena, receipt.public_summary
        ),
        receipt.price_arena,
    )))
}
