//! Agent store contract.
//!
//! Agents are created and persisted by the host. The engine loads a
//! profile at the start of a pipeline, mutates its own fields, and saves
//! it back; rescue and bounty credits use the targeted balance methods
//! so they compose with a concurrent pipeline for the same agent.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use townforge_types::{AgentId, AgentProfile};

use crate::error::ServiceError;

/// Contract for agent persistence.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Load one agent.
    async fn get(&self, id: AgentId) -> Result<AgentProfile, ServiceError>;

    /// All active agents.
    async fn list_active(&self) -> Result<Vec<AgentProfile>, ServiceError>;

    /// Persist the engine-owned fields of a profile.
    async fn save(&self, profile: &AgentProfile) -> Result<(), ServiceError>;

    /// Atomically add to an agent's bankroll (rescue, wage, bonus).
    /// The result is clamped at zero.
    async fn credit_bankroll(&self, id: AgentId, delta: i64) -> Result<i64, ServiceError>;

    /// Atomically adjust an agent's health, clamped to `0..=100`.
    async fn adjust_health(&self, id: AgentId, delta: i32) -> Result<i32, ServiceError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// In-memory agent store for tests.
#[derive(Debug, Default)]
pub struct InMemoryAgentStore {
    agents: Mutex<BTreeMap<AgentId, AgentProfile>>,
}

impl InMemoryAgentStore {
    /// Create a store seeded with the given profiles.
    pub fn with_agents(profiles: Vec<AgentProfile>) -> Self {
        let mut map = BTreeMap::new();
        for profile in profiles {
            map.insert(profile.id, profile);
        }
        Self {
            agents: Mutex::new(map),
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<AgentId, AgentProfile>>, ServiceError> {
        self.agents
            .lock()
            .map_err(|_| ServiceError::downstream("agent store poisoned"))
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn get(&self, id: AgentId) -> Result<AgentProfile, ServiceError> {
        let agents = self.lock()?;
        agents
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("agent {id}")))
    }

    async fn list_active(&self) -> Result<Vec<AgentProfile>, ServiceError> {
        let agents = self.lock()?;
        Ok(agents.values().filter(|a| a.is_active).cloned().collect())
    }

    async fn save(&self, profile: &AgentProfile) -> Result<(), ServiceError> {
        let mut agents = self.lock()?;
        agents.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn credit_bankroll(&self, id: AgentId, delta: i64) -> Result<i64, ServiceError> {
        let mut agents = self.lock()?;
        let agent = agents
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found(format!("agent {id}")))?;
        agent.bankroll = agent.bankroll.saturating_add(delta).max(0);
        Ok(agent.bankroll)
    }

    async fn adjust_health(&self, id: AgentId, delta: i32) -> Result<i32, ServiceError> {
        let mut agents = self.lock()?;
        let agent = agents
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found(format!("agent {id}")))?;
        agent.health = agent.health.saturating_add(delta).clamp(0, 100);
        Ok(agent.health)
    }
}
