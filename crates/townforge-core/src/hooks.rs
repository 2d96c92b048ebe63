//! Economy hooks driven by the scheduler and the agent pipelines:
//! solvency rescue, upkeep, rescue-debt repayment, streak rewards, and
//! the fumble tax.
//!
//! Every pool movement goes through the floor-guarded `PoolStore`
//! methods; the floor re-check happens inside the store's transaction,
//! never here.

use tracing::{debug, info, warn};
use townforge_types::{AgentId, AgentProfile, EventKind, TownId};

use townforge_economy::{
    upkeep_cost, FUMBLE_TAX_ARENA, FUMBLE_TAX_MIN_REMAINING, SOLVENCY_POOL_FLOOR,
    SOLVENCY_RESCUE_ARENA, SOLVENCY_RESCUE_HEALTH_BUMP, UPKEEP_DAMAGE_BROKE,
    UPKEEP_DAMAGE_DEFAULT,
};
use townforge_services::{AgentStore, PoolStore, TownService};

use crate::error::CoreError;
use crate::services::Services;
use crate::state::EngineState;

/// Issue a solvency rescue if the agent is eligible.
///
/// Atomically withdraws up to the rescue grant from the pool (respecting
/// the floor), credits the agent, bumps health, and accumulates rescue
/// debt. Returns the amount granted (0 when ineligible or the pool has
/// no headroom).
pub async fn maybe_rescue(
    services: &Services,
    state: &EngineState,
    profile: &AgentProfile,
    tick: u64,
    town_id: Option<TownId>,
) -> Result<i64, CoreError> {
    let eligible = state.rescues.is_eligible(
        profile.id,
        tick,
        profile.bankroll,
        profile.reserve_balance,
        profile.health,
    )?;
    if !eligible {
        return Ok(0);
    }

    let granted = services
        .pool
        .withdraw_arena_above_floor(SOLVENCY_RESCUE_ARENA, SOLVENCY_POOL_FLOOR)
        .await?;
    if granted <= 0 {
        debug!(agent_id = %profile.id, tick, "rescue eligible but pool has no headroom");
        return Ok(0);
    }

    services.agents.credit_bankroll(profile.id, granted).await?;
    services
        .agents
        .adjust_health(profile.id, SOLVENCY_RESCUE_HEALTH_BUMP)
        .await?;
    state.rescues.record_rescue(profile.id, tick, granted)?;

    info!(
        agent_id = %profile.id,
        tick,
        granted,
        "solvency rescue issued"
    );
    if let Some(town_id) = town_id {
        let _ = services
            .towns
            .log_event(
                town_id,
                EventKind::SolvencyRescue,
                "Solvency rescue",
                &format!("{} received {granted} $ARENA from the town fund", profile.name),
                Some(profile.id),
                serde_json::json!({ "granted": granted }),
            )
            .await;
    }
    Ok(granted)
}

/// Deduct per-tick upkeep, with a reserve-funded grace tick and health
/// damage for agents who cannot pay at all.
pub async fn apply_upkeep(
    services: &Services,
    profile: &AgentProfile,
    tick: u64,
    world_multiplier: rust_decimal::Decimal,
    town_id: Option<TownId>,
) -> Result<(), CoreError> {
    let cost = upkeep_cost(world_multiplier);

    if profile.bankroll >= cost {
        services.agents.credit_bankroll(profile.id, cost.saturating_neg()).await?;
        return Ok(());
    }

    if profile.reserve_balance > 0 {
        // Grace tick: funds exist, just not in $ARENA.
        debug!(agent_id = %profile.id, tick, cost, "upkeep grace tick (reserve cover)");
        if let Some(town_id) = town_id {
            let _ = services
                .towns
                .log_event(
                    town_id,
                    EventKind::Upkeep,
                    "Upkeep grace",
                    &format!("{} deferred upkeep against reserve", profile.name),
                    Some(profile.id),
                    serde_json::Value::Null,
                )
                .await;
        }
        return Ok(());
    }

    let damage = if profile.bankroll == 0 {
        UPKEEP_DAMAGE_BROKE
    } else {
        UPKEEP_DAMAGE_DEFAULT
    };
    let health = services
        .agents
        .adjust_health(profile.id, damage.saturating_neg())
        .await?;
    warn!(
        agent_id = %profile.id,
        tick,
        damage,
        health,
        "upkeep missed, health damaged"
    );
    Ok(())
}

/// Repay outstanding rescue debt from a solvent bankroll back into the
/// pool.
pub async fn apply_repayment(
    services: &Services,
    state: &EngineState,
    agent_id: AgentId,
) -> Result<i64, CoreError> {
    let profile = services.agents.get(agent_id).await?;
    let due = state.rescues.repayment_due(agent_id, profile.bankroll)?;
    if due <= 0 {
        return Ok(0);
    }
    services.agents.credit_bankroll(agent_id, due.saturating_neg()).await?;
    services.pool.credit_arena(due).await?;
    let remaining = state.rescues.apply_repayment(agent_id, due)?;
    debug!(agent_id = %agent_id, repaid = due, remaining, "rescue debt repayment");
    Ok(due)
}

/// Record the executed action in the streak book and fund any milestone
/// reward from the pool.
pub async fn apply_streak(
    services: &Services,
    state: &EngineState,
    agent_id: AgentId,
    is_rest: bool,
) -> Result<i64, CoreError> {
    let Some(reward) = state.streaks.record(agent_id, is_rest)? else {
        return Ok(0);
    };
    let funded = services
        .pool
        .withdraw_arena_above_floor(reward.amount, SOLVENCY_POOL_FLOOR)
        .await?;
    if funded > 0 {
        services.agents.credit_bankroll(agent_id, funded).await?;
        info!(
            agent_id = %agent_id,
            milestone = reward.milestone,
            funded,
            "streak milestone reward"
        );
    }
    Ok(funded)
}

/// Apply the fumble tax for a caught execution error: 1 $ARENA back to
/// the pool, but only if the agent keeps a small cushion afterwards.
pub async fn apply_fumble_tax(services: &Services, agent_id: AgentId) -> Result<(), CoreError> {
    let profile = services.agents.get(agent_id).await?;
    if profile
        .bankroll
        .saturating_sub(FUMBLE_TAX_ARENA)
        < FUMBLE_TAX_MIN_REMAINING
    {
        return Ok(());
    }
    services
        .agents
        .credit_bankroll(agent_id, FUMBLE_TAX_ARENA.saturating_neg())
        .await?;
    services.pool.credit_arena(FUMBLE_TAX_ARENA).await?;
    debug!(agent_id = %agent_id, "fumble tax applied");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testkit;
    use rust_decimal::Decimal;
    use townforge_economy::SOLVENCY_RESCUE_MAX_PER_WINDOW;
    use townforge_services::PoolStore;

    #[tokio::test]
    async fn rescue_credits_agent_and_builds_debt() {
        let fixture = testkit::fixture();
        let agent = testkit::agent("Wren", 10, 0);
        let id = agent.id;
        fixture.seed_agent(&agent).await;

        let granted = maybe_rescue(&fixture.services, &fixture.state, &agent, 5, None)
            .await
            .unwrap();
        assert_eq!(granted, SOLVENCY_RESCUE_ARENA);
        assert_eq!(fixture.bankroll(id).await, 10 + SOLVENCY_RESCUE_ARENA);
        assert_eq!(fixture.state.rescues.debt(id).unwrap(), SOLVENCY_RESCUE_ARENA);
    }

    #[tokio::test]
    async fn rescue_respects_window_cap() {
        let fixture = testkit::fixture();
        let agent = testkit::agent("Wren", 0, 0);
        fixture.seed_agent(&agent).await;

        let mut grants = 0_u32;
        for tick in 0..16 {
            let fresh = fixture.services.agents.get(agent.id).await.unwrap();
            // Drain the grant back out so the agent stays eligible.
            let granted = maybe_rescue(&fixture.services, &fixture.state, &fresh, tick, None)
                .await
                .unwrap();
            if granted > 0 {
                grants = grants.saturating_add(1);
                let _ = fixture
                    .services
                    .agents
                    .credit_bankroll(agent.id, -granted)
                    .await
                    .unwrap();
            }
        }
        assert_eq!(grants, SOLVENCY_RESCUE_MAX_PER_WINDOW);
    }

    #[tokio::test]
    async fn rescue_never_breaches_pool_floor() {
        let fixture = testkit::fixture_with_pool(1_010);
        let agent = testkit::agent("Wren", 0, 0);
        fixture.seed_agent(&agent).await;

        let granted = maybe_rescue(&fixture.services, &fixture.state, &agent, 3, None)
            .await
            .unwrap();
        assert_eq!(granted, 10);
        let balances = fixture.services.pool.balances().await.unwrap();
        assert_eq!(balances.arena_balance, SOLVENCY_POOL_FLOOR);
    }

    #[tokio::test]
    async fn upkeep_deducts_or_damages() {
        let fixture = testkit::fixture();

        let solvent = testkit::agent("Rich", 50, 0);
        fixture.seed_agent(&solvent).await;
        apply_upkeep(&fixture.services, &solvent, 1, Decimal::ONE, None)
            .await
            .unwrap();
        assert_eq!(fixture.bankroll(solvent.id).await, 49);

        let graced = testkit::agent("Covered", 0, 40);
        fixture.seed_agent(&graced).await;
        apply_upkeep(&fixture.services, &graced, 1, Decimal::ONE, None)
            .await
            .unwrap();
        assert_eq!(fixture.bankroll(graced.id).await, 0);
        assert_eq!(fixture.health(graced.id).await, 100);

        let broke = testkit::agent("Broke", 0, 0);
        fixture.seed_agent(&broke).await;
        apply_upkeep(&fixture.services, &broke, 1, Decimal::ONE, None)
            .await
            .unwrap();
        assert_eq!(fixture.health(broke.id).await, 98);
    }

    #[tokio::test]
    async fn repayment_moves_debt_back_to_pool() {
        let fixture = testkit::fixture();
        let agent = testkit::agent("Flush", 200, 0);
        fixture.seed_agent(&agent).await;
        fixture.state.rescues.record_rescue(agent.id, 1, 30).unwrap();

        let pool_before = fixture.services.pool.balances().await.unwrap().arena_balance;
        let repaid = apply_repayment(&fixture.services, &fixture.state, agent.id)
            .await
            .unwrap();
        assert!(repaid >= 1);
        let pool_after = fixture.services.pool.balances().await.unwrap().arena_balance;
        assert_eq!(pool_after, pool_before + repaid);
        assert_eq!(fixture.bankroll(agent.id).await, 200 - repaid);
    }

    #[tokio::test]
    async fn fumble_tax_keeps_a_cushion() {
        let fixture = testkit::fixture();

        let comfortable = testkit::agent("Okay", 10, 0);
        fixture.seed_agent(&comfortable).await;
        apply_fumble_tax(&fixture.services, comfortable.id).await.unwrap();
        assert_eq!(fixture.bankroll(comfortable.id).await, 9);

        let fragile = testkit::agent("Thin", 4, 0);
        fixture.seed_agent(&fragile).await;
        apply_fumble_tax(&fixture.services, fragile.id).await.unwrap();
        assert_eq!(fixture.bankroll(fragile.id).await, 4);
    }
}
