//! Shared test fixtures: a full `Services` bundle over the in-memory
//! stubs, plus agent factories.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use townforge_services::{
    AgentStore, InMemoryAgentStore, InMemoryPool, StubAmm, StubArena, StubCommandQueue,
    StubGoalTracker, StubModelGateway, StubSkillOracle, StubSocialGraph, StubTownService,
    StubVisuals, StubWheel, StubWorldEvents,
};
use townforge_types::{AgentId, AgentProfile, Archetype, LoopMode, PlotId, TownId, Zone};

use crate::services::Services;
use crate::state::EngineState;

/// A services bundle with typed handles onto each stub.
pub(crate) struct Fixture {
    pub services: Services,
    pub state: Arc<EngineState>,
    pub towns: Arc<StubTownService>,
    pub amm: Arc<StubAmm>,
    pub arena: Arc<StubArena>,
    pub gateway: Arc<StubModelGateway>,
    pub commands: Arc<StubCommandQueue>,
    pub visuals: Arc<StubVisuals>,
    pub pool: Arc<InMemoryPool>,
    pub oracle: Arc<StubSkillOracle>,
    pub wheel: Arc<StubWheel>,
    pub world_events: Arc<StubWorldEvents>,
    pub goals: Arc<StubGoalTracker>,
}

impl Fixture {
    pub async fn seed_agent(&self, profile: &AgentProfile) {
        self.services.agents.save(profile).await.unwrap();
    }

    pub async fn bankroll(&self, id: AgentId) -> i64 {
        self.services.agents.get(id).await.unwrap().bankroll
    }

    pub async fn health(&self, id: AgentId) -> i32 {
        self.services.agents.get(id).await.unwrap().health
    }
}

/// Fixture with a deep pool and no towns.
pub(crate) fn fixture() -> Fixture {
    fixture_inner(StubTownService::new(), 10_000, Vec::new())
}

/// Fixture with a specific pool $ARENA balance.
pub(crate) fn fixture_with_pool(arena_balance: i64) -> Fixture {
    fixture_inner(StubTownService::new(), arena_balance, Vec::new())
}

/// Fixture with an active town laid out from `zones`.
pub(crate) fn fixture_with_town(zones: &[Zone]) -> (Fixture, TownId, Vec<PlotId>) {
    let (towns, town_id, plots) = StubTownService::with_town(zones);
    (fixture_inner(towns, 10_000, Vec::new()), town_id, plots)
}

/// Fixture with an active town and scripted model replies.
pub(crate) fn fixture_with_replies(
    zones: &[Zone],
    replies: Vec<String>,
) -> (Fixture, TownId, Vec<PlotId>) {
    let (towns, town_id, plots) = StubTownService::with_town(zones);
    (fixture_inner(towns, 10_000, replies), town_id, plots)
}

fn fixture_inner(towns: StubTownService, pool_arena: i64, replies: Vec<String>) -> Fixture {
    let towns = Arc::new(towns);
    let amm = Arc::new(StubAmm::new());
    let arena = Arc::new(StubArena::default());
    let gateway = Arc::new(StubModelGateway::with_replies(replies));
    let commands = Arc::new(StubCommandQueue::new());
    let visuals = Arc::new(StubVisuals::new());
    let pool = Arc::new(InMemoryPool::new(10_000, pool_arena, 100));
    let oracle = Arc::new(StubSkillOracle::new());
    let wheel = Arc::new(StubWheel::new());
    let world_events = Arc::new(StubWorldEvents::new());
    let goals = Arc::new(StubGoalTracker::new());

    let services = Services {
        towns: Arc::clone(&towns) as _,
        agents: Arc::new(InMemoryAgentStore::default()) as _,
        amm: Arc::clone(&amm) as _,
        arena: Arc::clone(&arena) as _,
        skills: Arc::clone(&oracle) as _,
        gateway: Arc::clone(&gateway) as _,
        social: Arc::new(StubSocialGraph::new()) as _,
        goals: Arc::clone(&goals) as _,
        world_events: Arc::clone(&world_events) as _,
        wheel: Arc::clone(&wheel) as _,
        commands: Arc::clone(&commands) as _,
        visuals: Arc::clone(&visuals) as _,
        pool: Arc::clone(&pool) as _,
    };

    Fixture {
        services,
        state: Arc::new(EngineState::new()),
        towns,
        amm,
        arena,
        gateway,
        commands,
        visuals,
        pool,
        oracle,
        wheel,
        world_events,
        goals,
    }
}

/// A healthy default-mode agent profile.
pub(crate) fn agent(name: &str, bankroll: i64, reserve: i64) -> AgentProfile {
    AgentProfile {
        id: AgentId::new(),
        name: name.to_owned(),
        archetype: Archetype::Grinder,
        model_id: String::from("default"),
        bankroll,
        reserve_balance: reserve,
        health: 100,
        elo: 1200,
        is_active: true,
        is_in_match: false,
        current_match_id: None,
        scratchpad: Vec::new(),
        loop_mode: LoopMode::Default,
        last_action_type: None,
        last_reasoning: None,
        last_narrative: None,
        last_target_plot: None,
        last_tick_at: None,
        last_active_at: None,
        system_prompt: None,
    }
}
