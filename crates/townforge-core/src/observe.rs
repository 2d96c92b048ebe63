//! Observation assembly: one immutable world snapshot per agent per
//! tick.
//!
//! A pure data gather. Collaborators are queried concurrently; private
//! event kinds are stripped; when no active town exists the degenerate
//! snapshot still lets the rest of the pipeline run.

use tracing::warn;
use townforge_services::{
    AgentStore, AmmService, GoalTracker, SkillOracle, SocialGraph, TownService, WheelOfFate,
    WorldEvents,
};
use townforge_types::{
    AgentProfile, Observation, PeerView, PoolSummary, SelfView, WheelWindow, WorldStats,
};

use crate::error::CoreError;
use crate::services::Services;
use crate::state::EngineState;

/// How many recent town events an observation carries.
const RECENT_EVENT_LIMIT: usize = 30;

/// Assemble the observation for one agent at one tick.
pub async fn build_observation(
    services: &Services,
    state: &EngineState,
    profile: &AgentProfile,
    tick: u64,
) -> Result<Observation, CoreError> {
    let self_view = self_view(state, profile, tick);

    let pool = services.amm.get_pool_summary().await.unwrap_or_else(|e| {
        warn!(agent_id = %profile.id, error = %e, "pool summary unavailable, using zeros");
        PoolSummary {
            spot_price: rust_decimal::Decimal::ONE,
            fee_bps: 0,
            reserve_balance: 0,
            arena_balance: 0,
        }
    });

    let Some(town) = services.towns.get_active_town().await? else {
        return Ok(Observation::degenerate(tick, self_view, pool));
    };

    // Independent gathers run concurrently; each failure degrades to an
    // empty collection rather than failing the snapshot.
    let (
        my_plots,
        available_plots,
        recent_events,
        world,
        peers,
        relationships,
        goals,
        wheel,
        world_events,
        skill_outputs,
    ) = tokio::join!(
        services.towns.get_agent_plots(profile.id),
        services.towns.get_available_plots(town.id),
        services.towns.get_recent_events(town.id, RECENT_EVENT_LIMIT),
        services.towns.get_world_stats(),
        services.agents.list_active(),
        services.social.relationships(profile.id),
        services.goals.active_goals(profile.id),
        services.wheel.window(),
        services.world_events.active_events(),
        services.skills.recent_outputs(profile.id),
    );

    let recent_events = recent_events
        .unwrap_or_default()
        .into_iter()
        .filter(|e| !e.kind.is_private())
        .collect();

    let other_agents = peers
        .unwrap_or_default()
        .into_iter()
        .filter(|p| p.id != profile.id)
        .map(|p| PeerView {
            id: p.id,
            name: p.name,
            archetype: p.archetype,
            bankroll: p.bankroll,
            elo: p.elo,
            health: p.health,
            is_in_match: p.is_in_match,
            last_action_type: p.last_action_type,
        })
        .collect();

    Ok(Observation {
        tick,
        town: Some(town),
        my_plots: my_plots.unwrap_or_default(),
        available_plots: available_plots.unwrap_or_default(),
        self_view,
        pool,
        recent_events,
        skill_outputs: skill_outputs.unwrap_or_default(),
        other_agents,
        relationships: relationships.unwrap_or_default(),
        world: world.unwrap_or(WorldStats {
            completed_towns: 0,
            upkeep_multiplier: rust_decimal::Decimal::ONE,
            cost_multiplier: rust_decimal::Decimal::ONE,
        }),
        wheel: wheel.unwrap_or(WheelWindow {
            phase: townforge_types::WheelPhase::Idle,
            game_type: None,
            wager: None,
            buffs: Vec::new(),
            queued_agents: Vec::new(),
        }),
        goals: goals.unwrap_or_default(),
        world_events: world_events.unwrap_or_default(),
    })
}

/// Build the agent's own view, including the trade-cooldown distance.
fn self_view(state: &EngineState, profile: &AgentProfile, tick: u64) -> SelfView {
    SelfView {
        id: profile.id,
        name: profile.name.clone(),
        archetype: profile.archetype,
        bankroll: profile.bankroll,
        reserve_balance: profile.reserve_balance,
        health: profile.health,
        elo: profile.elo,
        is_in_match: profile.is_in_match,
        scratchpad: profile.scratchpad.clone(),
        last_action_type: profile.last_action_type,
        ticks_since_last_trade: state.ticks_since_last_trade(profile.id, tick),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testkit;
    use townforge_services::TownService;
    use townforge_types::{EventKind, Zone};

    #[tokio::test]
    async fn no_town_yields_degenerate_snapshot() {
        let fixture = testkit::fixture();
        let agent = testkit::agent("Ode", 50, 0);
        fixture.seed_agent(&agent).await;

        let obs = build_observation(&fixture.services, &fixture.state, &agent, 3)
            .await
            .unwrap();
        assert!(obs.town.is_none());
        assert!(obs.my_plots.is_empty());
        assert_eq!(obs.self_view.bankroll, 50);
    }

    #[tokio::test]
    async fn private_events_are_stripped() {
        let (fixture, town_id, _) = testkit::fixture_with_town(&[Zone::Residential]);
        let agent = testkit::agent("Ode", 50, 0);
        fixture.seed_agent(&agent).await;

        fixture
            .services
            .towns
            .log_event(town_id, EventKind::BuildStarted, "public", "a build", None, serde_json::Value::Null)
            .await
            .unwrap();
        fixture
            .services
            .towns
            .log_event(town_id, EventKind::X402Skill, "private", "a report", None, serde_json::Value::Null)
            .await
            .unwrap();

        let obs = build_observation(&fixture.services, &fixture.state, &agent, 3)
            .await
            .unwrap();
        assert_eq!(obs.recent_events.len(), 1);
        assert_eq!(
            obs.recent_events.first().map(|e| e.kind),
            Some(EventKind::BuildStarted)
        );
    }

    #[tokio::test]
    async fn peers_exclude_self() {
        let (fixture, _, _) = testkit::fixture_with_town(&[Zone::Residential]);
        let me = testkit::agent("Me", 50, 0);
        let other = testkit::agent("Other", 80, 0);
        fixture.seed_agent(&me).await;
        fixture.seed_agent(&other).await;

        let obs = build_observation(&fixture.services, &fixture.state, &me, 1)
            .await
            .unwrap();
        assert_eq!(obs.other_agents.len(), 1);
        assert_eq!(obs.other_agents.first().map(|p| p.name.as_str()), Some("Other"));
    }
}
