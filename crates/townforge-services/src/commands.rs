//! Command-queue contract: the control plane's side of owner commands.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use townforge_types::{AgentCommand, AgentId, CommandId, CommandReceipt, CommandStatus};

use crate::error::ServiceError;

/// Contract for the command-queue collaborator.
///
/// Ordering guarantee: per agent, commands are handed out FIFO, and a
/// receipt is delivered before the next command can be accepted.
#[async_trait]
pub trait CommandQueue: Send + Sync {
    /// Pop the oldest QUEUED command for the agent and transition it to
    /// ACCEPTED. Returns `None` when the agent has no queued command.
    async fn accept_next(&self, agent_id: AgentId)
        -> Result<Option<AgentCommand>, ServiceError>;

    /// Terminalize an accepted command.
    async fn finalize(&self, id: CommandId, status: CommandStatus) -> Result<(), ServiceError>;

    /// Deliver the compliance receipt to the control plane.
    async fn deliver_receipt(&self, receipt: &CommandReceipt) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// In-memory stub
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StubQueueState {
    queued: BTreeMap<AgentId, Vec<AgentCommand>>,
    finalized: Vec<(CommandId, CommandStatus)>,
    receipts: Vec<CommandReceipt>,
}

/// FIFO in-memory command queue.
#[derive(Debug, Default)]
pub struct StubCommandQueue {
    state: Mutex<StubQueueState>,
}

impl StubCommandQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a command for its agent.
    pub fn push(&self, command: AgentCommand) {
        if let Ok(mut state) = self.state.lock() {
            state.queued.entry(command.agent_id).or_default().push(command);
        }
    }

    /// Receipts delivered so far (test assertion).
    pub fn receipts(&self) -> Vec<CommandReceipt> {
        self.state
            .lock()
            .map(|s| s.receipts.clone())
            .unwrap_or_default()
    }

    /// Finalizations recorded so far (test assertion).
    pub fn finalized(&self) -> Vec<(CommandId, CommandStatus)> {
        self.state
            .lock()
            .map(|s| s.finalized.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandQueue for StubCommandQueue {
    async fn accept_next(
        &self,
        agent_id: AgentId,
    ) -> Result<Option<AgentCommand>, ServiceError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ServiceError::downstream("command stub poisoned"))?;
        let next = state
            .queued
            .get_mut(&agent_id)
            .and_then(|queue| if queue.is_empty() { None } else { Some(queue.remove(0)) });
        Ok(next)
    }

    async fn finalize(&self, id: CommandId, status: CommandStatus) -> Result<(), ServiceError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ServiceError::downstream("command stub poisoned"))?;
        state.finalized.push((id, status));
        Ok(())
    }

    async fn deliver_receipt(&self, receipt: &CommandReceipt) -> Result<(), ServiceError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ServiceError::downstream("command stub poisoned"))?;
        state.receipts.push(receipt.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use townforge_types::CommandMode;

    fn command(agent_id: AgentId, intent: &str) -> AgentCommand {
        AgentCommand {
            id: CommandId::new(),
            agent_id,
            mode: CommandMode::Strong,
            intent: intent.to_owned(),
            params: serde_json::json!({}),
            expected_action_type: None,
            constraints: None,
            audit_meta: None,
        }
    }

    #[tokio::test]
    async fn accept_next_is_fifo_per_agent() {
        let queue = StubCommandQueue::new();
        let agent = AgentId::new();
        queue.push(command(agent, "build"));
        queue.push(command(agent, "fight"));

        let first = queue.accept_next(agent).await.unwrap().unwrap();
        assert_eq!(first.intent, "build");
        let second = queue.accept_next(agent).await.unwrap().unwrap();
        assert_eq!(second.intent, "fight");
        assert!(queue.accept_next(agent).await.unwrap().is_none());
    }
}
