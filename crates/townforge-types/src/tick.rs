//! Per-tick output types: the tick result delivered to the host callback
//! and the decision record kept for audit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::command::CommandReceipt;
use crate::enums::{ActionType, CommandMode, DecisionPath};
use crate::ids::{AgentId, CommandId};
use crate::policy::{OverrideRate, PolicyNote};

/// The outcome of one agent's tick, delivered to the host's
/// `on_tick_result` callback and folded into the agent's journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResult {
    /// The tick number.
    pub tick: u64,
    /// The agent this result belongs to.
    pub agent_id: AgentId,
    /// The action that actually executed (post-redirect).
    pub action: Action,
    /// Whether execution succeeded.
    pub success: bool,
    /// Narrative outcome line shown to owners.
    pub narrative: String,
    /// Net $ARENA spent by the action (negative = earned).
    pub cost: i64,
    /// Error message when `success` is false.
    pub error: Option<String>,
    /// Names of humans whose queued instructions were consumed this tick.
    pub instruction_senders: Option<Vec<String>>,
    /// The model's reply to queued human instructions, if it wrote one.
    pub human_reply: Option<String>,
    /// Receipt for the command resolved this tick, if any.
    pub command_receipt: Option<CommandReceipt>,
}

impl TickResult {
    /// Reify a pipeline failure into a rest-result, per the scheduler's
    /// never-abort contract.
    pub fn from_failure(tick: u64, agent_id: AgentId, error: String) -> Self {
        Self {
            tick,
            agent_id,
            action: Action::rest("pipeline failure"),
            success: false,
            narrative: format!("Stumbled this tick: {error}"),
            cost: 0,
            error: Some(error),
            instruction_senders: None,
            human_reply: None,
            command_receipt: None,
        }
    }
}

/// Metadata from a model call, for the decision record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCallMeta {
    /// The resolved model name.
    pub model: String,
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens produced.
    pub output_tokens: u64,
    /// Estimated cost in cents.
    pub cost_cents: Decimal,
    /// Wall-clock latency of the call.
    pub latency_ms: u64,
}

/// Reference to the command that shaped a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMeta {
    /// The command id.
    pub id: CommandId,
    /// The command mode.
    pub mode: CommandMode,
}

/// Audit record for one decision: what was chosen, what ran, and why
/// they differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// The tick number.
    pub tick: u64,
    /// The deciding agent.
    pub agent_id: AgentId,
    /// Which path produced the decision.
    pub path: DecisionPath,
    /// The action the decision path chose.
    pub chosen: Action,
    /// The action type that actually executed (post-overlay, post-redirect).
    pub executed_type: ActionType,
    /// The model's arithmetic shown in its response, if any.
    pub calculations: Option<String>,
    /// Overlay diagnostics, applied or not.
    pub policy_notes: Vec<PolicyNote>,
    /// Override rate before this decision entered the window.
    pub autonomy_before: OverrideRate,
    /// Override rate after this decision entered the window.
    pub autonomy_after: OverrideRate,
    /// Goal descriptions before the tick.
    pub goal_stack_before: Vec<String>,
    /// Goal descriptions after the tick.
    pub goal_stack_after: Vec<String>,
    /// Net bankroll delta produced by execution.
    pub economy_delta: i64,
    /// The command that shaped this decision, if any.
    pub command: Option<CommandMeta>,
    /// Model call metadata when the path was [`DecisionPath::Llm`].
    pub model_meta: Option<ModelCallMeta>,
}
