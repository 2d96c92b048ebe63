//! Owner command and compliance receipt types.
//!
//! Commands originate in the control plane and move through
//! `QUEUED -> ACCEPTED -> (EXECUTED | REJECTED | EXPIRED | CANCELLED)`.
//! The engine accepts at most one command per agent per tick and always
//! terminalizes what it accepts with a [`CommandReceipt`].

use serde::{Deserialize, Serialize};

use crate::enums::{ActionType, CommandMode, Compliance, NudgeKind, ReasonCode};
use crate::ids::{AgentId, CommandId};

/// A queued human instruction for an agent.
///
/// Instructions are softer than commands: they are drained into the
/// model prompt (and into the degen loop's nudge) at the agent's next
/// tick and never force an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanInstruction {
    /// Display name of the sender.
    pub sender: String,
    /// Free-text instruction.
    pub text: String,
    /// Parsed steering nudge, when the text maps to one.
    pub nudge: Option<NudgeKind>,
}

/// Optional guard rails attached to a command by its issuer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConstraints {
    /// Maximum $ARENA the command may spend.
    pub max_spend: Option<i64>,
    /// Plot index the command must target.
    pub target_plot_index: Option<u32>,
    /// Tick after which the command must not execute.
    pub deadline_tick: Option<u64>,
}

/// Routing metadata carried through to the receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMeta {
    /// Chat channel to notify with the receipt, if any.
    pub chat_id: Option<String>,
    /// Display name of the issuer.
    pub issuer: Option<String>,
}

/// An owner/operator directive for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCommand {
    /// Command identifier.
    pub id: CommandId,
    /// The agent this command targets.
    pub agent_id: AgentId,
    /// Binding strength.
    pub mode: CommandMode,
    /// Intent keyword (e.g. "build", "work", "fight", "trade", "rest").
    pub intent: String,
    /// Intent-specific parameter bag.
    pub params: serde_json::Value,
    /// The action type the issuer expects to see executed.
    pub expected_action_type: Option<ActionType>,
    /// Issuer guard rails.
    pub constraints: Option<CommandConstraints>,
    /// Routing metadata.
    pub audit_meta: Option<AuditMeta>,
}

impl AgentCommand {
    /// The chat id receipts should notify, if the issuer provided one.
    pub fn notify_chat_id(&self) -> Option<&str> {
        self.audit_meta.as_ref().and_then(|m| m.chat_id.as_deref())
    }
}

/// Terminal disposition of an accepted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    /// The command's action executed successfully.
    Executed,
    /// The command was rejected; see the reason code.
    Rejected,
}

/// Compliance receipt emitted after an accepted command resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReceipt {
    /// The command this receipt resolves.
    pub command_id: CommandId,
    /// The agent that executed (or failed) it.
    pub agent_id: AgentId,
    /// The tick the command resolved at.
    pub tick: u64,
    /// Executed or rejected.
    pub status: ReceiptStatus,
    /// Full/partial compliance, present on executed receipts.
    pub compliance: Option<Compliance>,
    /// Why a rejected command failed.
    pub reason_code: Option<ReasonCode>,
    /// The action type that actually executed, if any.
    pub executed_action_type: Option<ActionType>,
    /// Human-readable outcome line.
    pub message: String,
    /// Chat channel the control plane should notify.
    pub notify_chat_id: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn notify_chat_id_comes_from_audit_meta() {
        let mut command = AgentCommand {
            id: CommandId::new(),
            agent_id: AgentId::new(),
            mode: CommandMode::Strong,
            intent: String::from("build"),
            params: serde_json::json!({}),
            expected_action_type: Some(ActionType::StartBuild),
            constraints: None,
            audit_meta: None,
        };
        assert!(command.notify_chat_id().is_none());

        command.audit_meta = Some(AuditMeta {
            chat_id: Some(String::from("chat-42")),
            issuer: Some(String::from("owner")),
        });
        assert_eq!(command.notify_chat_id(), Some("chat-42"));
    }

    #[test]
    fn receipt_serializes_screaming_status() {
        let receipt = CommandReceipt {
            command_id: CommandId::new(),
            agent_id: AgentId::new(),
            tick: 3,
            status: ReceiptStatus::Rejected,
            compliance: None,
            reason_code: Some(ReasonCode::TargetUnavailable),
            executed_action_type: None,
            message: String::from("plot 4 is already claimed"),
            notify_chat_id: None,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json.get("status").and_then(|v| v.as_str()), Some("REJECTED"));
        assert_eq!(
            json.get("reason_code").and_then(|v| v.as_str()),
            Some("TARGET_UNAVAILABLE")
        );
    }
}
