//! The bundle of collaborator handles the engine runs against.

use std::sync::Arc;

use townforge_economy::{EconomyConfig, EconomyError};
use townforge_services::{
    AgentStore, AmmService, ArenaService, BuildingVisuals, CommandQueue, GoalTracker,
    InMemoryPool, ModelGateway, PoolStore, SkillOracle, SocialGraph, TownService, WheelOfFate,
    WorldEvents,
};

/// Every collaborator the engine needs, held as shared handles.
///
/// The host process constructs this once with its real implementations;
/// tests assemble it from the in-memory stubs.
#[derive(Clone)]
pub struct Services {
    /// Town/plot service.
    pub towns: Arc<dyn TownService>,
    /// Agent persistence.
    pub agents: Arc<dyn AgentStore>,
    /// Off-chain AMM.
    pub amm: Arc<dyn AmmService>,
    /// PvP match engine.
    pub arena: Arc<dyn ArenaService>,
    /// Paid-skill oracle.
    pub skills: Arc<dyn SkillOracle>,
    /// Language-model gateway.
    pub gateway: Arc<dyn ModelGateway>,
    /// Social graph.
    pub social: Arc<dyn SocialGraph>,
    /// Goal tracker.
    pub goals: Arc<dyn GoalTracker>,
    /// World-event generator.
    pub world_events: Arc<dyn WorldEvents>,
    /// Wheel-of-fate cycle.
    pub wheel: Arc<dyn WheelOfFate>,
    /// Owner command queue.
    pub commands: Arc<dyn CommandQueue>,
    /// Building visual selector.
    pub visuals: Arc<dyn BuildingVisuals>,
    /// Shared economy pool row.
    pub pool: Arc<dyn PoolStore>,
}

/// Build an in-memory pool row from the `ECONOMY_*` environment
/// variables (hosts with a persistent pool implement [`PoolStore`]
/// themselves and skip this).
pub fn pool_from_env() -> Result<InMemoryPool, EconomyError> {
    let config = EconomyConfig::from_env()?;
    Ok(InMemoryPool::new(
        config.init_reserve,
        config.init_arena,
        config.fee_bps,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use townforge_services::PoolStore as _;

    #[tokio::test]
    async fn env_pool_uses_defaults_when_unset() {
        let pool = pool_from_env().unwrap();
        let balances = pool.balances().await.unwrap();
        assert!(balances.reserve_balance >= 1_000);
        assert!(balances.fee_bps <= 1_000);
    }
}
