//! The `play_arena` handler: opponent selection and the turbo match
//! loop.
//!
//! The match engine owns the rules; this handler only ranks opponents,
//! drives a capped sequence of moves with a fixed preference order, and
//! cancels (with refunds) if the match will not settle.

use rand::Rng;
use tracing::{debug, warn};
use townforge_types::{
    Action, ActionParams, EventKind, GameType, PeerView, ReasonCode, RelationKind,
};

use townforge_economy::{ARENA_MIN_BANKROLL, DEFAULT_ARENA_WAGER};
use townforge_services::{
    AmmService, ArenaService, MatchRequest, MatchState, MatchStatus, SwapSide, TownService,
};

use super::{ExecCtx, ExecOutcome, Step};
use crate::error::CoreError;

/// Hard cap on moves the turbo loop will submit.
const TURBO_MAX_MOVES: u32 = 14;

/// Ranking bonus for rivals.
const RIVAL_BONUS: i64 = 120;

/// Move preference after the opening all-in.
const MOVE_PRIORITY: [&str; 5] = ["call", "check", "all-in", "raise", "fold"];

/// Challenge another agent to a wagered match and drive it to settlement.
pub(super) async fn play(ctx: &ExecCtx<'_>, action: Action) -> Result<Step, CoreError> {
    let (game_type, wager) = match &action.params {
        ActionParams::PlayArena { game_type, wager, .. } => (
            game_type.unwrap_or(GameType::Poker),
            wager.unwrap_or(DEFAULT_ARENA_WAGER),
        ),
        _ => (GameType::Poker, DEFAULT_ARENA_WAGER),
    };

    if ctx.profile.is_in_match {
        return Ok(Step::Done(ExecOutcome::failed(
            action,
            ReasonCode::ConstraintViolation,
            "already in a match",
        )));
    }
    if ctx.observation.wheel.is_queued(ctx.profile.id) {
        return Ok(Step::Done(ExecOutcome::failed(
            action,
            ReasonCode::ConstraintViolation,
            "already queued for the wheel duel",
        )));
    }

    // Funding: lenient mode tries a reserve swap first.
    let mut bankroll = ctx.profile.bankroll;
    if bankroll < ARENA_MIN_BANKROLL {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::InsufficientArena,
                format!("needs {ARENA_MIN_BANKROLL} $ARENA to enter the arena"),
            )));
        }
        if ctx.profile.reserve_balance > 0 {
            match ctx
                .services
                .amm
                .swap(
                    ctx.profile.id,
                    SwapSide::BuyArena,
                    ctx.profile.reserve_balance,
                    None,
                )
                .await
            {
                Ok(execution) => {
                    ctx.state.note_trade(ctx.profile.id, ctx.tick);
                    bankroll = bankroll.saturating_add(execution.amount_out);
                }
                Err(err) => {
                    debug!(agent_id = %ctx.profile.id, error = %err, "pre-fight funding swap failed");
                }
            }
        }
        if bankroll < ARENA_MIN_BANKROLL {
            let rested = action.redirect(ActionParams::Rest, "could not fund a match");
            return Ok(Step::Done(ExecOutcome::done(
                rested,
                "Too broke for the arena even after raiding the reserve.",
                0,
            )));
        }
    }

    let Some(opponent) = pick_opponent(ctx) else {
        if ctx.strict {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::NoOpponents,
                "no eligible opponents",
            )));
        }
        let rested = action.redirect(ActionParams::Rest, "no eligible opponents");
        return Ok(Step::Done(ExecOutcome::done(
            rested,
            "Nobody worth fighting tonight.",
            0,
        )));
    };

    let wager = wager.clamp(1, bankroll);
    let created = match ctx
        .services
        .arena
        .create_match(MatchRequest {
            agent_id: ctx.profile.id,
            opponent_id: opponent.id,
            game_type,
            wager_amount: wager,
            skip_prediction_market: true,
        })
        .await
    {
        Ok(state) => state,
        Err(err) => {
            return Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::MatchCreateFailed,
                err.to_string(),
            )));
        }
    };

    match drive_turbo_loop(ctx, &created).await? {
        LoopEnd::Settled(final_state) => {
            let won = final_state.winner == Some(ctx.profile.id);
            let narrative = if won {
                format!(
                    "Beat {} at {game_type:?} for the {} $ARENA pot.",
                    opponent.name, final_state.pot
                )
            } else {
                format!("Lost {wager} $ARENA to {} at {game_type:?}.", opponent.name)
            };
            if let Some(town) = &ctx.observation.town {
                let _ = ctx
                    .services
                    .towns
                    .log_event(
                        town.id,
                        EventKind::MatchResolved,
                        "Match resolved",
                        &narrative,
                        Some(ctx.profile.id),
                        serde_json::json!({
                            "opponent": opponent.name,
                            "wager": wager,
                            "won": won,
                        }),
                    )
                    .await;
            }
            let cost = if won { wager.saturating_neg() } else { wager };
            Ok(Step::Done(ExecOutcome::done(action, narrative, cost)))
        }
        LoopEnd::TimedOut => {
            warn!(
                agent_id = %ctx.profile.id,
                match_id = %created.id,
                "turbo loop hit the move cap, cancelling with refunds"
            );
            if let Err(err) = ctx
                .services
                .arena
                .cancel_match(created.id, ctx.profile.id)
                .await
            {
                warn!(match_id = %created.id, error = %err, "match cancel failed");
            }
            Ok(Step::Done(ExecOutcome::failed(
                action,
                ReasonCode::MatchTimeout,
                "match exceeded the turbo move cap and was cancelled",
            )))
        }
    }
}

/// Outcome of driving the move loop.
enum LoopEnd {
    /// The engine reported a terminal state.
    Settled(MatchState),
    /// The cap elapsed with the match still open.
    TimedOut,
}

/// Submit up to [`TURBO_MAX_MOVES`] moves using the fixed preference
/// order, falling back to the engine's first listed valid action when a
/// preferred move is rejected.
async fn drive_turbo_loop(
    ctx: &ExecCtx<'_>,
    created: &MatchState,
) -> Result<LoopEnd, CoreError> {
    let mut state = created.clone();
    let mut moves = 0_u32;

    while moves < TURBO_MAX_MOVES {
        if state.status != MatchStatus::InProgress {
            return Ok(LoopEnd::Settled(state));
        }
        // Only move when it is our turn; otherwise poll.
        if state.active_agent != Some(ctx.profile.id) {
            state = ctx.services.arena.get_match_state(state.id).await?;
            if state.status != MatchStatus::InProgress {
                return Ok(LoopEnd::Settled(state));
            }
        }

        let preferred = preferred_move(moves, &state.valid_actions);
        state = match ctx
            .services
            .arena
            .submit_move(state.id, ctx.profile.id, &preferred)
            .await
        {
            Ok(next) => next,
            Err(err) => {
                debug!(move_name = preferred, error = %err, "move rejected, trying safe fallback");
                let fallback = state
                    .valid_actions
                    .first()
                    .cloned()
                    .unwrap_or_else(|| String::from("fold"));
                ctx.services
                    .arena
                    .submit_move(state.id, ctx.profile.id, &fallback)
                    .await?
            }
        };
        moves = moves.saturating_add(1);
    }

    if state.status == MatchStatus::InProgress {
        Ok(LoopEnd::TimedOut)
    } else {
        Ok(LoopEnd::Settled(state))
    }
}

/// The move to try: all-in on the opening move, then the fixed priority
/// list filtered by what the engine currently allows.
fn preferred_move(moves_so_far: u32, valid_actions: &[String]) -> String {
    let allows = |name: &str| valid_actions.iter().any(|a| a == name);
    if moves_so_far == 0 && allows("all-in") {
        return String::from("all-in");
    }
    MOVE_PRIORITY
        .iter()
        .find(|name| allows(name))
        .map(|name| (*name).to_owned())
        .or_else(|| valid_actions.first().cloned())
        .unwrap_or_else(|| String::from("fold"))
}

/// Rank eligible opponents by rivalry, elo proximity, and bankroll.
fn pick_opponent(ctx: &ExecCtx<'_>) -> Option<PeerView> {
    let mut rng = rand::rng();
    let mut best: Option<(i64, PeerView)> = None;

    for peer in &ctx.observation.other_agents {
        if peer.is_in_match || peer.health <= 0 || peer.bankroll < ARENA_MIN_BANKROLL {
            continue;
        }
        let rival = ctx
            .observation
            .relationships
            .iter()
            .any(|r| r.agent_id == peer.id && r.kind == RelationKind::Rival);
        let rival_bonus = if rival { RIVAL_BONUS } else { 0 };
        let elo_gap = i64::from(ctx.profile.elo.abs_diff(peer.elo));
        let elo_proximity = (100_i64).saturating_sub(elo_gap.saturating_div(8)).max(0);
        let bankroll_score = peer.bankroll.saturating_div(10).min(50);
        // Small random jitter keeps repeated ticks from always picking
        // the same table.
        let jitter = rng.random_range(0..5_i64);
        let score = rival_bonus
            .saturating_add(elo_proximity)
            .saturating_add(bankroll_score)
            .saturating_add(jitter);

        let better = best.as_ref().is_none_or(|(s, _)| score > *s);
        if better {
            best = Some((score, peer.clone()));
        }
    }
    best.map(|(_, peer)| peer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn opening_move_is_all_in_when_legal() {
        let valid = vec![
            String::from("fold"),
            String::from("call"),
            String::from("all-in"),
        ];
        assert_eq!(preferred_move(0, &valid), "all-in");
        // Later streets prefer call over the rest.
        assert_eq!(preferred_move(1, &valid), "call");
    }

    #[test]
    fn priority_falls_through_to_first_valid() {
        let valid = vec![String::from("discard"), String::from("draw")];
        assert_eq!(preferred_move(3, &valid), "discard");
        assert_eq!(preferred_move(3, &[]), "fold");
    }
}
