//! Command control: receipt construction and terminalization.
//!
//! Every command the pipeline accepts is terminalized exactly once, and
//! its receipt is delivered before the agent's next tick can accept
//! another command (the pipeline is the only consumer of the queue).

use tracing::warn;
use townforge_services::CommandQueue;
use townforge_types::{
    AgentCommand, CommandReceipt, CommandStatus, Compliance, ReasonCode, ReceiptStatus,
};

use crate::exec::ExecOutcome;
use crate::services::Services;

/// Build the receipt for a command whose action reached execution.
///
/// `EXECUTED` requires success, and for forced (STRONG/OVERRIDE)
/// commands the executed action type must also match the expectation.
/// Compliance is `FULL` on a type match and `PARTIAL` otherwise.
pub fn build_receipt(
    command: &AgentCommand,
    tick: u64,
    outcome: &ExecOutcome,
    incapacitated: bool,
) -> CommandReceipt {
    let executed_type = outcome.action.action_type;
    let types_match = command
        .expected_action_type
        .is_none_or(|expected| expected == executed_type);

    let executed = outcome.success && (!command.mode.is_forced() || types_match);

    if executed {
        CommandReceipt {
            command_id: command.id,
            agent_id: command.agent_id,
            tick,
            status: ReceiptStatus::Executed,
            compliance: Some(if types_match {
                Compliance::Full
            } else {
                Compliance::Partial
            }),
            reason_code: None,
            executed_action_type: Some(executed_type),
            message: outcome.narrative.clone(),
            notify_chat_id: command.notify_chat_id().map(ToOwned::to_owned),
        }
    } else {
        let reason_code = if incapacitated {
            ReasonCode::AgentIncapacitated
        } else if outcome.success {
            // Succeeded as a different action than a forced command
            // demanded.
            ReasonCode::ConstraintViolation
        } else {
            outcome.reason.unwrap_or(ReasonCode::ExecutionFailed)
        };
        CommandReceipt {
            command_id: command.id,
            agent_id: command.agent_id,
            tick,
            status: ReceiptStatus::Rejected,
            compliance: None,
            reason_code: Some(reason_code),
            executed_action_type: Some(executed_type),
            message: outcome
                .error
                .clone()
                .unwrap_or_else(|| outcome.narrative.clone()),
            notify_chat_id: command.notify_chat_id().map(ToOwned::to_owned),
        }
    }
}

/// Build a rejection receipt for a command that never reached execution
/// (translation failure, incapacitation).
pub fn rejection_receipt(
    command: &AgentCommand,
    tick: u64,
    reason_code: ReasonCode,
    message: impl Into<String>,
) -> CommandReceipt {
    CommandReceipt {
        command_id: command.id,
        agent_id: command.agent_id,
        tick,
        status: ReceiptStatus::Rejected,
        compliance: None,
        reason_code: Some(reason_code),
        executed_action_type: None,
        message: message.into(),
        notify_chat_id: command.notify_chat_id().map(ToOwned::to_owned),
    }
}

/// Terminalize the command and deliver its receipt. Failures only warn;
/// the tick result still carries the receipt.
pub async fn resolve_command(
    services: &Services,
    command: &AgentCommand,
    receipt: &CommandReceipt,
) {
    let status = match receipt.status {
        ReceiptStatus::Executed => CommandStatus::Executed,
        ReceiptStatus::Rejected => CommandStatus::Rejected,
    };
    if let Err(err) = services.commands.finalize(command.id, status).await {
        warn!(command_id = %command.id, error = %err, "command finalize failed");
    }
    if let Err(err) = services.commands.deliver_receipt(receipt).await {
        warn!(command_id = %command.id, error = %err, "receipt delivery failed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use townforge_types::{
        Action, ActionType, AgentId, AuditMeta, CommandId, CommandMode,
    };

    fn command(mode: CommandMode, expected: Option<ActionType>) -> AgentCommand {
        AgentCommand {
            id: CommandId::new(),
            agent_id: AgentId::new(),
            mode,
            intent: String::from("build"),
            params: serde_json::json!({}),
            expected_action_type: expected,
            constraints: None,
            audit_meta: Some(AuditMeta {
                chat_id: Some(String::from("chat-7")),
                issuer: None,
            }),
        }
    }

    fn success_outcome(action_type: ActionType) -> ExecOutcome {
        let action = match action_type {
            ActionType::DoWork => Action::new(
                townforge_types::ActionParams::DoWork { plot_id: None, plot_index: Some(0) },
                "working",
            ),
            _ => Action::rest("resting"),
        };
        ExecOutcome::done(action, "done", 0)
    }

    #[test]
    fn forced_match_is_full_compliance() {
        let cmd = command(CommandMode::Strong, Some(ActionType::DoWork));
        let receipt = build_receipt(&cmd, 5, &success_outcome(ActionType::DoWork), false);
        assert_eq!(receipt.status, ReceiptStatus::Executed);
        assert_eq!(receipt.compliance, Some(Compliance::Full));
        assert_eq!(receipt.notify_chat_id.as_deref(), Some("chat-7"));
    }

    #[test]
    fn forced_mismatch_is_rejected() {
        let cmd = command(CommandMode::Override, Some(ActionType::DoWork));
        let receipt = build_receipt(&cmd, 5, &success_outcome(ActionType::Rest), false);
        assert_eq!(receipt.status, ReceiptStatus::Rejected);
        assert_eq!(receipt.reason_code, Some(ReasonCode::ConstraintViolation));
    }

    #[test]
    fn suggest_mismatch_is_partial_compliance() {
        let cmd = command(CommandMode::Suggest, Some(ActionType::DoWork));
        let receipt = build_receipt(&cmd, 5, &success_outcome(ActionType::Rest), false);
        assert_eq!(receipt.status, ReceiptStatus::Executed);
        assert_eq!(receipt.compliance, Some(Compliance::Partial));
    }

    #[test]
    fn failure_carries_reason_code() {
        let cmd = command(CommandMode::Strong, Some(ActionType::DoWork));
        let outcome = ExecOutcome::failed(
            Action::rest("x"),
            ReasonCode::InsufficientArena,
            "too broke",
        );
        let receipt = build_receipt(&cmd, 5, &outcome, false);
        assert_eq!(receipt.status, ReceiptStatus::Rejected);
        assert_eq!(receipt.reason_code, Some(ReasonCode::InsufficientArena));
        assert_eq!(receipt.message, "too broke");
    }

    #[test]
    fn incapacitation_overrides_reason() {
        let cmd = command(CommandMode::Strong, Some(ActionType::DoWork));
        let outcome = ExecOutcome::failed(
            Action::rest("x"),
            ReasonCode::ExecutionFailed,
            "down",
        );
        let receipt = build_receipt(&cmd, 5, &outcome, true);
        assert_eq!(receipt.reason_code, Some(ReasonCode::AgentIncapacitated));
    }
}
