//! Forced-command translation.
//!
//! STRONG and OVERRIDE commands bypass the decision engine: a
//! deterministic translator turns the command's `intent` and `params`
//! into a concrete [`Action`] against the current observation. Failures
//! reject the command (the caller falls back to the normal decision
//! path with no command in force).

use townforge_types::{
    Action, ActionParams, ActionType, AgentCommand, NudgeKind, Observation, ReasonCode,
};

use townforge_policy::plan_deterministic_action;

use crate::parse::{params_from_details, parse_action_type};

/// Why a command could not be translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationFailure {
    /// Rejection code for the receipt. Always one of `INVALID_INTENT`,
    /// `TARGET_UNAVAILABLE`, or `CONSTRAINT_VIOLATION`.
    pub reason_code: ReasonCode,
    /// Operator-facing explanation.
    pub reason: String,
}

/// Translate a forced command into a concrete action.
pub fn translate_command(
    command: &AgentCommand,
    observation: &Observation,
) -> Result<Action, TranslationFailure> {
    // Constraint: expired commands never execute.
    if let Some(deadline) = command.constraints.as_ref().and_then(|c| c.deadline_tick)
        && observation.tick > deadline
    {
        return Err(TranslationFailure {
            reason_code: ReasonCode::ConstraintViolation,
            reason: format!("command deadline tick {deadline} has passed"),
        });
    }

    let intent = command.intent.trim().to_lowercase();

    // Keyword intents go through the pure planner.
    if let Some(kind) = nudge_from_intent(&intent) {
        let plan =
            plan_deterministic_action(observation, kind).map_err(TranslationFailure::from)?;
        let action = Action::new(plan.params, format!("Owner command: {intent}"));
        let action = apply_plot_constraint(action, command);
        return check_plot_constraint(action, command);
    }

    // Direct action-type intents reuse the model-response extractors.
    let Some(action_type) = parse_action_type(&intent) else {
        return Err(TranslationFailure {
            reason_code: ReasonCode::InvalidIntent,
            reason: format!("unknown intent '{}'", command.intent),
        });
    };

    let params = params_from_details(action_type, &command.params);
    let action = apply_plot_constraint(
        Action::new(params, format!("Owner command: {intent}")),
        command,
    );
    let action = check_plot_constraint(action, command)?;
    validate_against_observation(action, observation)
}

/// Map a keyword intent onto a planner nudge.
fn nudge_from_intent(intent: &str) -> Option<NudgeKind> {
    match intent {
        "build" => Some(NudgeKind::Build),
        "work" => Some(NudgeKind::Work),
        "fight" => Some(NudgeKind::Fight),
        "trade" => Some(NudgeKind::Trade),
        "rest" => Some(NudgeKind::Rest),
        _ => None,
    }
}

/// Fill a missing plot index from the command's constraint.
fn apply_plot_constraint(mut action: Action, command: &AgentCommand) -> Action {
    let Some(target) = command
        .constraints
        .as_ref()
        .and_then(|c| c.target_plot_index)
    else {
        return action;
    };
    match &mut action.params {
        ActionParams::ClaimPlot { plot_index }
        | ActionParams::StartBuild { plot_index, .. }
        | ActionParams::DoWork { plot_index, .. }
        | ActionParams::CompleteBuild { plot_index, .. } => {
            if plot_index.is_none() {
                *plot_index = Some(target);
            }
        }
        _ => {}
    }
    action
}

/// Reject plans that contradict the command's plot constraint.
fn check_plot_constraint(
    action: Action,
    command: &AgentCommand,
) -> Result<Action, TranslationFailure> {
    let Some(target) = command
        .constraints
        .as_ref()
        .and_then(|c| c.target_plot_index)
    else {
        return Ok(action);
    };
    let actual = match &action.params {
        ActionParams::ClaimPlot { plot_index }
        | ActionParams::StartBuild { plot_index, .. }
        | ActionParams::DoWork { plot_index, .. }
        | ActionParams::CompleteBuild { plot_index, .. } => *plot_index,
        _ => None,
    };
    match actual {
        Some(index) if index != target => Err(TranslationFailure {
            reason_code: ReasonCode::ConstraintViolation,
            reason: format!("command targets plot {target} but plan resolved plot {index}"),
        }),
        _ => Ok(action),
    }
}

/// Cheap availability checks the translator can do before dispatch.
fn validate_against_observation(
    action: Action,
    observation: &Observation,
) -> Result<Action, TranslationFailure> {
    match (&action.action_type, &action.params) {
        (ActionType::ClaimPlot, ActionParams::ClaimPlot { plot_index }) => {
            let Some(index) = plot_index else {
                return Err(TranslationFailure {
                    reason_code: ReasonCode::InvalidIntent,
                    reason: String::from("claim_plot needs a plot index"),
                });
            };
            if observation.available_plots.iter().any(|p| p.index == *index) {
                Ok(action)
            } else {
                Err(TranslationFailure {
                    reason_code: ReasonCode::TargetUnavailable,
                    reason: format!("plot {index} is not claimable"),
                })
            }
        }
        _ => Ok(action),
    }
}

impl From<townforge_policy::PlanRejection> for TranslationFailure {
    fn from(rejection: townforge_policy::PlanRejection) -> Self {
        // Translation failures surface only the three command rejection
        // codes; economic shortfalls read as constraint violations.
        let reason_code = match rejection.reason_code {
            ReasonCode::TargetUnavailable => ReasonCode::TargetUnavailable,
            _ => ReasonCode::ConstraintViolation,
        };
        Self {
            reason_code,
            reason: rejection.reason,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use townforge_types::{
        AgentId, Archetype, CommandConstraints, CommandId, CommandMode, PlotId, PlotStatus,
        PoolSummary, SelfView, TownId, TownStatus, TownView, Zone,
    };

    fn observation(bankroll: i64) -> Observation {
        let self_view = SelfView {
            id: AgentId::new(),
            name: String::from("Juno"),
            archetype: Archetype::Shark,
            bankroll,
            reserve_balance: 0,
            health: 100,
            elo: 1200,
            is_in_match: false,
            scratchpad: Vec::new(),
            last_action_type: None,
            ticks_since_last_trade: None,
        };
        let pool = PoolSummary {
            spot_price: Decimal::ONE,
            fee_bps: 100,
            reserve_balance: 10_000,
            arena_balance: 10_000,
        };
        let mut obs = Observation::degenerate(12, self_view, pool);
        obs.town = Some(TownView {
            id: TownId::new(),
            name: String::from("Town 1"),
            level: 1,
            status: TownStatus::Building,
            plots_total: 9,
            plots_claimed: 1,
        });
        obs
    }

    fn plot(index: u32, status: PlotStatus) -> townforge_types::PlotView {
        townforge_types::PlotView {
            id: PlotId::new(),
            town_id: TownId::new(),
            index,
            zone: Zone::Residential,
            status,
            owner: None,
            building_type: None,
            building_name: None,
            work_steps: 0,
            build_cost: None,
        }
    }

    fn command(intent: &str, params: serde_json::Value) -> AgentCommand {
        AgentCommand {
            id: CommandId::new(),
            agent_id: AgentId::new(),
            mode: CommandMode::Strong,
            intent: intent.to_owned(),
            params,
            expected_action_type: None,
            constraints: None,
            audit_meta: None,
        }
    }

    #[test]
    fn keyword_intent_uses_planner() {
        let mut obs = observation(100);
        obs.my_plots = vec![{
            let mut p = plot(0, PlotStatus::UnderConstruction);
            p.owner = Some(obs.self_view.id);
            p.work_steps = 2;
            p
        }];
        let action = translate_command(&command("build", serde_json::json!({})), &obs).unwrap();
        assert_eq!(action.action_type, ActionType::DoWork);
    }

    #[test]
    fn direct_claim_requires_available_plot() {
        let mut obs = observation(100);
        obs.available_plots = vec![plot(5, PlotStatus::Empty)];

        let ok = translate_command(
            &command("claim_plot", serde_json::json!({"plotIndex": 5})),
            &obs,
        );
        assert!(ok.is_ok());

        let missing = translate_command(
            &command("claim_plot", serde_json::json!({"plotIndex": 8})),
            &obs,
        )
        .unwrap_err();
        assert_eq!(missing.reason_code, ReasonCode::TargetUnavailable);
    }

    #[test]
    fn unknown_intent_is_invalid() {
        let obs = observation(100);
        let failure =
            translate_command(&command("moonwalk", serde_json::json!({})), &obs).unwrap_err();
        assert_eq!(failure.reason_code, ReasonCode::InvalidIntent);
    }

    #[test]
    fn expired_deadline_is_a_constraint_violation() {
        let obs = observation(100);
        let mut cmd = command("rest", serde_json::json!({}));
        cmd.constraints = Some(CommandConstraints {
            max_spend: None,
            target_plot_index: None,
            deadline_tick: Some(5),
        });
        let failure = translate_command(&cmd, &obs).unwrap_err();
        assert_eq!(failure.reason_code, ReasonCode::ConstraintViolation);
    }

    #[test]
    fn plot_constraint_fills_missing_index() {
        let mut obs = observation(100);
        obs.available_plots = vec![plot(3, PlotStatus::Empty)];
        let mut cmd = command("claim_plot", serde_json::json!({}));
        cmd.constraints = Some(CommandConstraints {
            max_spend: None,
            target_plot_index: Some(3),
            deadline_tick: None,
        });
        let action = translate_command(&cmd, &obs).unwrap();
        assert_eq!(
            action.params,
            ActionParams::ClaimPlot { plot_index: Some(3) }
        );
    }

    #[test]
    fn planner_shortfall_reads_as_constraint_violation() {
        // Broke agent, claimable land: the planner says INSUFFICIENT_ARENA,
        // the command receipt reads CONSTRAINT_VIOLATION.
        let mut obs = observation(1);
        obs.available_plots = vec![plot(0, PlotStatus::Empty)];
        let failure =
            translate_command(&command("build", serde_json::json!({})), &obs).unwrap_err();
        assert_eq!(failure.reason_code, ReasonCode::ConstraintViolation);
    }
}
