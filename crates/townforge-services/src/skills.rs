//! Paid-skill oracle contract.
//!
//! The oracle runs the paid analysis, debits the agent's $ARENA itself,
//! and returns a public summary that later shows up in observations.

use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use townforge_types::{AgentId, SkillKind, SkillOutput};

use crate::error::ServiceError;

/// A skill purchase request forwarded to the oracle.
#[derive(Debug, Clone)]
pub struct SkillRequest {
    /// The buying agent.
    pub agent_id: AgentId,
    /// Which skill is being bought.
    pub skill: SkillKind,
    /// The question put to the oracle.
    pub question: String,
    /// Why the agent needs the answer this tick.
    pub why_now: Option<String>,
    /// What the agent intends to do with the answer.
    pub expected_next_action: Option<String>,
    /// Conditional plan recorded with the purchase.
    pub if_then: Option<String>,
    /// Skill-specific parameters forwarded verbatim.
    pub params: serde_json::Value,
}

/// The oracle's response to a purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillReceipt {
    /// $ARENA debited by the oracle.
    pub price_arena: i64,
    /// Publicly visible summary of the output.
    pub public_summary: String,
}

/// Contract for the paid-skill oracle collaborator.
#[async_trait]
pub trait SkillOracle: Send + Sync {
    /// Buy a skill; the oracle debits the agent inside its own
    /// transaction.
    async fn buy_skill(&self, request: SkillRequest) -> Result<SkillReceipt, ServiceError>;

    /// Estimate the $ARENA price of a skill at the given spot price.
    async fn estimate_price_arena(
        &self,
        skill: SkillKind,
        spot_price: Decimal,
    ) -> Result<i64, ServiceError>;

    /// The agent's recent purchased outputs, newest first.
    async fn recent_outputs(&self, agent_id: AgentId) -> Result<Vec<SkillOutput>, ServiceError>;
}

// ---------------------------------------------------------------------------
// In-memory stub
// ---------------------------------------------------------------------------

/// Oracle stub with flat prices and canned summaries.
#[derive(Debug, Default)]
pub struct StubSkillOracle {
    purchases: Mutex<Vec<SkillRequest>>,
    outputs: Mutex<Vec<(AgentId, SkillOutput)>>,
}

impl StubSkillOracle {
    /// Create an empty stub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Purchases recorded so far (test assertion).
    pub fn purchases(&self) -> usize {
        self.purchases.lock().map(|p| p.len()).unwrap_or(0)
    }

    const fn flat_price(skill: SkillKind) -> i64 {
        match skill {
            SkillKind::MarketDepth => 8,
            SkillKind::BlueprintIndex => 12,
            SkillKind::ScoutReport => 10,
        }
    }
}

#[async_trait]
impl SkillOracle for StubSkillOracle {
    async fn buy_skill(&self, request: SkillRequest) -> Result<SkillReceipt, ServiceError> {
        let price_arena = Self::flat_price(request.skill);
        let public_summary = format!("{:?} report purchased", request.skill);
        if let Ok(mut outputs) = self.outputs.lock() {
            outputs.push((
                request.agent_id,
                SkillOutput {
                    skill: request.skill,
                    public_summary: public_summary.clone(),
                    tick: 0,
                },
            ));
        }
        if let Ok(mut purchases) = self.purchases.lock() {
            purchases.push(request);
        }
        Ok(SkillReceipt {
            price_arena,
            public_summary,
        })
    }

    async fn estimate_price_arena(
        &self,
        skill: SkillKind,
        spot_price: Decimal,
    ) -> Result<i64, ServiceError> {
        let _ = spot_price;
        Ok(Self::flat_price(skill))
    }

    async fn recent_outputs(&self, agent_id: AgentId) -> Result<Vec<SkillOutput>, ServiceError> {
        Ok(self
            .outputs
            .lock()
            .map(|outputs| {
                let mut mine: Vec<SkillOutput> = outputs
                    .iter()
                    .filter(|(owner, _)| *owner == agent_id)
                    .map(|(_, output)| output.clone())
                    .collect();
                mine.reverse();
                mine
            })
            .unwrap_or_default())
    }
}
