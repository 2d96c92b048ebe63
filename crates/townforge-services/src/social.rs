//! Social graph and goal tracker contracts.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use townforge_types::{AgentId, GoalView, RelationshipView};

use crate::error::ServiceError;

/// Contract for the social graph collaborator.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Scored friend/rival edges for the agent.
    async fn relationships(&self, agent_id: AgentId)
        -> Result<Vec<RelationshipView>, ServiceError>;
}

/// Contract for the goal-tracking collaborator.
#[async_trait]
pub trait GoalTracker: Send + Sync {
    /// Live objectives for the agent.
    async fn active_goals(&self, agent_id: AgentId) -> Result<Vec<GoalView>, ServiceError>;
}

// ---------------------------------------------------------------------------
// In-memory stubs
// ---------------------------------------------------------------------------

/// Static social graph stub.
#[derive(Debug, Default)]
pub struct StubSocialGraph {
    edges: Mutex<BTreeMap<AgentId, Vec<RelationshipView>>>,
}

impl StubSocialGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the edges returned for one agent.
    pub fn set_edges(&self, agent_id: AgentId, edges: Vec<RelationshipView>) {
        if let Ok(mut map) = self.edges.lock() {
            map.insert(agent_id, edges);
        }
    }
}

#[async_trait]
impl SocialGraph for StubSocialGraph {
    async fn relationships(
        &self,
        agent_id: AgentId,
    ) -> Result<Vec<RelationshipView>, ServiceError> {
        Ok(self
            .edges
            .lock()
            .ok()
            .and_then(|m| m.get(&agent_id).cloned())
            .unwrap_or_default())
    }
}

/// Static goal tracker stub.
#[derive(Debug, Default)]
pub struct StubGoalTracker {
    goals: Mutex<BTreeMap<AgentId, Vec<GoalView>>>,
}

impl StubGoalTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the goals returned for one agent.
    pub fn set_goals(&self, agent_id: AgentId, goals: Vec<GoalView>) {
        if let Ok(mut map) = self.goals.lock() {
            map.insert(agent_id, goals);
        }
    }
}

#[async_trait]
impl GoalTracker for StubGoalTracker {
    async fn active_goals(&self, agent_id: AgentId) -> Result<Vec<GoalView>, ServiceError> {
        Ok(self
            .goals
            .lock()
            .ok()
            .and_then(|m| m.get(&agent_id).cloned())
            .unwrap_or_default())
    }
}
