//! The per-agent tick pipeline:
//! observe, accept command, decide, overlay, execute, retention hooks,
//! memory, receipt.
//!
//! Pipelines run concurrently across agents within a tick; each one
//! touches only its own agent's persistent fields (plus the shared pool,
//! through the floor-guarded store). Nothing thrown inside a pipeline
//! escapes: every failure is reified into a `TickResult` and the tick
//! continues.

use chrono::Utc;
use tracing::{debug, info, warn};
use townforge_types::{
    Action, ActionParams, ActionType, AgentCommand, AgentId, CommandMeta, DecisionPath,
    DecisionRecord, LoopMode, Observation, TickResult,
};

use townforge_decision::DecisionEngine;
use townforge_policy::apply_overlays;
use townforge_services::{AgentStore, CommandQueue};

use crate::command::{build_receipt, rejection_receipt, resolve_command};
use crate::error::CoreError;
use crate::exec::{self, ExecCtx, ExecOutcome};
use crate::hooks;
use crate::observe::build_observation;
use crate::services::Services;
use crate::state::EngineState;

/// Run one agent's complete tick. Never returns an error: failures are
/// reified into the returned result.
pub async fn run_agent_pipeline(
    services: &Services,
    state: &EngineState,
    engine: &DecisionEngine,
    agent_id: AgentId,
    tick: u64,
) -> TickResult {
    match pipeline_inner(services, state, engine, agent_id, tick).await {
        Ok(result) => result,
        Err(err) => {
            warn!(agent_id = %agent_id, tick, error = %err, "agent pipeline failed");
            // A thrown pipeline still costs the fumble tax.
            if let Err(tax_err) = hooks::apply_fumble_tax(services, agent_id).await {
                warn!(agent_id = %agent_id, error = %tax_err, "fumble tax failed after pipeline error");
            }
            TickResult::from_failure(tick, agent_id, err.to_string())
        }
    }
}

/// The fallible pipeline body.
async fn pipeline_inner(
    services: &Services,
    state: &EngineState,
    engine: &DecisionEngine,
    agent_id: AgentId,
    tick: u64,
) -> Result<TickResult, CoreError> {
    let mut profile = services.agents.get(agent_id).await?;
    // The in-memory loop-mode map overrides the persisted default.
    let mapped = state.loop_mode(agent_id);
    if mapped != LoopMode::Default {
        profile.loop_mode = mapped;
    }

    let observation = build_observation(services, state, &profile, tick).await?;
    let instructions = state.drain_instructions(agent_id);
    let instruction_senders: Vec<String> =
        instructions.iter().map(|i| i.sender.clone()).collect();

    // At most one command is accepted per agent per tick.
    let mut command = match services.commands.accept_next(agent_id).await {
        Ok(command) => command,
        Err(err) => {
            warn!(agent_id = %agent_id, tick, error = %err, "command queue unavailable");
            None
        }
    };

    // Decide: forced translation first, then degen/model.
    let mut pre_rejection = None;
    let mut decided = None;
    if let Some(cmd) = command.as_ref().filter(|c| c.mode.is_forced()) {
        match engine.translate_forced(cmd, &observation) {
            Ok(action) => {
                decided = Some(townforge_decision::Decided {
                    action,
                    path: DecisionPath::Forced,
                    calculations: None,
                    human_reply: None,
                    model_meta: None,
                });
            }
            Err(failure) => {
                info!(
                    agent_id = %agent_id,
                    tick,
                    command_id = %cmd.id,
                    reason = %failure.reason_code,
                    "forced command rejected at translation"
                );
                let receipt =
                    rejection_receipt(cmd, tick, failure.reason_code, failure.reason);
                resolve_command(services, cmd, &receipt).await;
                pre_rejection = Some(receipt);
                command = None;
            }
        }
    }
    let decided = match decided {
        Some(decided) => decided,
        None => {
            engine
                .decide(&profile, &observation, command.as_ref(), &instructions)
                .await
        }
    };

    // Overlay applies to model decisions only, budgeted by the
    // override-rate window.
    let (executed_action, policy_notes, autonomy_before, autonomy_after) =
        if decided.path == DecisionPath::Llm {
            let before = state.overrides.rate(agent_id);
            let outcome = apply_overlays(decided.action.clone(), &observation, before);
            let after = state.overrides.record(agent_id, outcome.overridden);
            (outcome.action, outcome.notes, before, after)
        } else {
            let rate = state.overrides.rate(agent_id);
            (decided.action.clone(), Vec::new(), rate, rate)
        };

    // Execute, strictly under a forced command.
    let strict = command.as_ref().is_some_and(|c| c.mode.is_forced());
    let ctx = ExecCtx {
        services,
        state,
        profile: &profile,
        observation: &observation,
        tick,
        strict,
    };
    let outcome = exec::execute(&ctx, executed_action).await;

    // Retention hooks: streak on the executed action.
    let is_rest = outcome.action.action_type == ActionType::Rest;
    if let Err(err) = hooks::apply_streak(services, state, agent_id, is_rest).await {
        warn!(agent_id = %agent_id, error = %err, "streak hook failed");
    }

    emit_decision_record(
        &decided,
        &outcome,
        &observation,
        agent_id,
        tick,
        policy_notes.clone(),
        autonomy_before,
        autonomy_after,
        command.as_ref(),
    );

    // Memory: reload the persisted profile (collaborators may have moved
    // balances mid-pipeline) and fold in the engine-owned fields.
    let mut fresh = services.agents.get(agent_id).await?;
    update_memory(&mut fresh, &decided.action, &outcome, tick);
    services.agents.save(&fresh).await?;

    // Receipt for a command that reached execution.
    let command_receipt = if let Some(cmd) = command.as_ref() {
        let receipt = build_receipt(cmd, tick, &outcome, fresh.is_incapacitated());
        resolve_command(services, cmd, &receipt).await;
        Some(receipt)
    } else {
        pre_rejection
    };

    debug!(
        agent_id = %agent_id,
        tick,
        chosen = decided.action.action_type.as_str(),
        executed = outcome.action.action_type.as_str(),
        success = outcome.success,
        path = decided.path.as_str(),
        "agent tick complete"
    );

    Ok(TickResult {
        tick,
        agent_id,
        action: outcome.action,
        success: outcome.success,
        narrative: outcome.narrative,
        cost: outcome.cost,
        error: outcome.error,
        instruction_senders: if instruction_senders.is_empty() {
            None
        } else {
            Some(instruction_senders)
        },
        human_reply: decided.human_reply,
        command_receipt,
    })
}

/// Log the structured decision record.
#[allow(clippy::too_many_arguments)]
fn emit_decision_record(
    decided: &townforge_decision::Decided,
    outcome: &ExecOutcome,
    observation: &Observation,
    agent_id: AgentId,
    tick: u64,
    policy_notes: Vec<townforge_types::PolicyNote>,
    autonomy_before: townforge_types::OverrideRate,
    autonomy_after: townforge_types::OverrideRate,
    command: Option<&AgentCommand>,
) {
    let goals: Vec<String> = observation
        .goals
        .iter()
        .map(|g| g.description.clone())
        .collect();
    let record = DecisionRecord {
        tick,
        agent_id,
        path: decided.path,
        chosen: decided.action.clone(),
        executed_type: outcome.action.action_type,
        calculations: decided.calculations.clone(),
        policy_notes,
        autonomy_before,
        autonomy_after,
        goal_stack_before: goals.clone(),
        goal_stack_after: goals,
        economy_delta: outcome.cost.saturating_neg(),
        command: command.map(|c| CommandMeta { id: c.id, mode: c.mode }),
        model_meta: decided.model_meta.clone(),
    };
    info!(
        agent_id = %agent_id,
        tick,
        path = record.path.as_str(),
        chosen = record.chosen.action_type.as_str(),
        executed = record.executed_type.as_str(),
        overrides = record.autonomy_after.overrides,
        "decision recorded"
    );
    debug!(record = ?record, "decision record detail");
}

/// Fold the tick's outcome into the agent's journal and last-action
/// fields.
fn update_memory(profile: &mut townforge_types::AgentProfile, chosen: &Action, outcome: &ExecOutcome, tick: u64) {
    let verdict = if outcome.success { "ok" } else { "failed" };
    profile.journal(format!(
        "[t{tick}] {} -> {} ({verdict}): {}",
        chosen.action_type.as_str(),
        outcome.action.action_type.as_str(),
        truncate(&outcome.narrative, 120)
    ));
    profile.last_action_type = Some(outcome.action.action_type);
    profile.last_reasoning = Some(truncate(&outcome.action.reasoning, 300));
    profile.last_narrative = Some(outcome.narrative.clone());
    profile.last_target_plot = target_plot(&outcome.action);
    profile.last_tick_at = Some(tick);
    profile.last_active_at = Some(Utc::now());
}

/// The plot index an action targeted, if any.
fn target_plot(action: &Action) -> Option<u32> {
    match &action.params {
        ActionParams::ClaimPlot { plot_index }
        | ActionParams::StartBuild { plot_index, .. }
        | ActionParams::DoWork { plot_index, .. }
        | ActionParams::CompleteBuild { plot_index, .. } => *plot_index,
        _ => None,
    }
}

/// Bounded copy of a narrative string.
fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testkit;
    use std::sync::Arc;
    use townforge_decision::PromptEngine;
    use townforge_services::{PoolStore, ScriptedMove, StubArena, TownService};
    use townforge_types::{
        AgentCommand, CommandId, CommandMode, Compliance, PlotStatus, ReasonCode, ReceiptStatus,
        WheelPhase, Zone,
    };

    fn engine(fixture: &testkit::Fixture) -> DecisionEngine {
        DecisionEngine::new(
            Arc::clone(&fixture.gateway) as _,
            PromptEngine::embedded().unwrap(),
        )
    }

    async fn run(
        fixture: &testkit::Fixture,
        engine: &DecisionEngine,
        agent_id: AgentId,
        tick: u64,
    ) -> TickResult {
        run_agent_pipeline(&fixture.services, &fixture.state, engine, agent_id, tick).await
    }

    #[tokio::test]
    async fn model_claim_decision_executes() {
        let (fixture, _, _) = testkit::fixture_with_replies(
            &[Zone::Residential, Zone::Commercial],
            vec![String::from(
                r#"{"type": "claim_plot", "reasoning": "corner lot", "details": {"plotIndex": 0}}"#,
            )],
        );
        let agent = testkit::agent("Juno", 100, 0);
        fixture.seed_agent(&agent).await;
        let engine = engine(&fixture);

        let result = run(&fixture, &engine, agent.id, 1).await;
        assert!(result.success);
        assert_eq!(result.action.action_type, ActionType::ClaimPlot);

        let plots = fixture.services.towns.get_agent_plots(agent.id).await.unwrap();
        assert_eq!(plots.len(), 1);

        // The journal remembers the tick.
        let saved = fixture.services.agents.get(agent.id).await.unwrap();
        assert_eq!(saved.last_action_type, Some(ActionType::ClaimPlot));
        assert!(saved.scratchpad.iter().any(|e| e.contains("[t1]")));
    }

    #[tokio::test]
    async fn forced_work_command_gets_full_compliance() {
        let (fixture, _, plot_ids) = testkit::fixture_with_replies(
            &[Zone::Residential],
            vec![String::from("Step prose: we raised \"The Long Room\" frame today.")],
        );
        let agent = testkit::agent("Brick", 100, 0);
        fixture.seed_agent(&agent).await;
        let plot_id = *plot_ids.first().unwrap();
        fixture.towns.patch_plot(plot_id, |p| {
            p.status = PlotStatus::UnderConstruction;
            p.owner = Some(agent.id);
            p.work_steps = 1;
            p.building_type = Some(String::from("long hall"));
            p.build_cost = Some(12);
        });

        fixture.commands.push(AgentCommand {
            id: CommandId::new(),
            agent_id: agent.id,
            mode: CommandMode::Strong,
            intent: String::from("work"),
            params: serde_json::json!({}),
            expected_action_type: Some(ActionType::DoWork),
            constraints: None,
            audit_meta: None,
        });

        let engine = engine(&fixture);
        let result = run(&fixture, &engine, agent.id, 2).await;

        assert!(result.success);
        let receipt = result.command_receipt.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Executed);
        assert_eq!(receipt.compliance, Some(Compliance::Full));
        // The receipt also reached the control plane.
        assert_eq!(fixture.commands.receipts().len(), 1);
    }

    #[tokio::test]
    async fn failed_translation_rejects_and_falls_through() {
        // Work command with nothing under construction: translation
        // fails, the command is rejected, and the degen loop still acts.
        let (fixture, _, _) = testkit::fixture_with_town(&[Zone::Residential]);
        let agent = testkit::agent("Brick", 100, 40);
        fixture.seed_agent(&agent).await;
        fixture.state.set_loop_mode(agent.id, townforge_types::LoopMode::DegenLoop);

        fixture.commands.push(AgentCommand {
            id: CommandId::new(),
            agent_id: agent.id,
            mode: CommandMode::Override,
            intent: String::from("work"),
            params: serde_json::json!({}),
            expected_action_type: Some(ActionType::DoWork),
            constraints: None,
            audit_meta: None,
        });

        let engine = engine(&fixture);
        let result = run(&fixture, &engine, agent.id, 3).await;

        let receipt = result.command_receipt.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Rejected);
        assert_eq!(receipt.reason_code, Some(ReasonCode::ConstraintViolation));
        // The normal path still produced an action (profit rotation).
        assert_eq!(result.action.action_type, ActionType::BuyArena);
        assert!(result.success);
    }

    #[tokio::test]
    async fn suggest_command_never_overrides() {
        // The model rests; the SUGGEST command wanted work. The rest
        // stands, and the receipt shows partial compliance.
        let (fixture, _, plot_ids) = testkit::fixture_with_replies(
            &[Zone::Residential],
            vec![String::from(
                r#"{"type": "rest", "reasoning": "conserving", "details": {}}"#,
            )],
        );
        let agent = testkit::agent("Moth", 100, 0);
        fixture.seed_agent(&agent).await;
        // A completed plot: nothing for the overlay to steer toward.
        let plot_id = *plot_ids.first().unwrap();
        fixture.towns.patch_plot(plot_id, |p| {
            p.status = PlotStatus::Complete;
            p.owner = Some(agent.id);
            p.work_steps = 3;
        });

        fixture.commands.push(AgentCommand {
            id: CommandId::new(),
            agent_id: agent.id,
            mode: CommandMode::Suggest,
            intent: String::from("work"),
            params: serde_json::json!({}),
            expected_action_type: Some(ActionType::DoWork),
            constraints: None,
            audit_meta: None,
        });

        let engine = engine(&fixture);
        let result = run(&fixture, &engine, agent.id, 4).await;

        assert_eq!(result.action.action_type, ActionType::Rest);
        let receipt = result.command_receipt.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Executed);
        assert_eq!(receipt.compliance, Some(Compliance::Partial));
    }

    #[tokio::test]
    async fn overlay_steers_idle_rest_into_foothold() {
        let (fixture, _, _) = testkit::fixture_with_replies(
            &[Zone::Residential],
            vec![String::from(
                r#"{"type": "rest", "reasoning": "nothing to do", "details": {}}"#,
            )],
        );
        let agent = testkit::agent("Fern", 100, 0);
        fixture.seed_agent(&agent).await;

        let engine = engine(&fixture);
        let result = run(&fixture, &engine, agent.id, 1).await;

        assert!(result.success);
        assert_eq!(result.action.action_type, ActionType::ClaimPlot);
        assert!(result.action.reasoning.contains("[REDIRECT"));
    }

    #[tokio::test]
    async fn degen_agent_fights_the_wheel() {
        let (fixture, _, _) = testkit::fixture_with_town(&[Zone::Residential]);
        let agent = testkit::agent("Dex", 60, 0);
        let rival = testkit::agent("Mark", 60, 0);
        fixture.seed_agent(&agent).await;
        fixture.seed_agent(&rival).await;
        fixture.state.set_loop_mode(agent.id, townforge_types::LoopMode::DegenLoop);
        fixture.wheel.set_window(townforge_types::WheelWindow {
            phase: WheelPhase::Announcing,
            game_type: Some(townforge_types::GameType::Poker),
            wager: Some(20),
            buffs: Vec::new(),
            queued_agents: Vec::new(),
        });

        // The arena stub resolves after two accepted moves.
        let scripted = StubArena::with_script(vec![
            ScriptedMove::Accept,
            ScriptedMove::AcceptAndWin,
        ]);
        let mut services = fixture.services.clone();
        services.arena = Arc::new(scripted);

        let engine = engine(&fixture);
        let result =
            run_agent_pipeline(&services, &fixture.state, &engine, agent.id, 2).await;

        assert!(result.success);
        assert_eq!(result.action.action_type, ActionType::PlayArena);
        assert!(result.narrative.contains("Beat"));
    }

    #[tokio::test]
    async fn execution_error_applies_fumble_tax() {
        // The decision reply is queued, but the work-drafting call finds
        // an empty gateway: the handler throws, the tax lands.
        let (fixture, _, plot_ids) = testkit::fixture_with_replies(
            &[Zone::Residential],
            vec![String::from(
                r#"{"type": "do_work", "reasoning": "keep at it", "details": {"plotIndex": 0}}"#,
            )],
        );
        let agent = testkit::agent("Slip", 50, 0);
        fixture.seed_agent(&agent).await;
        let plot_id = *plot_ids.first().unwrap();
        fixture.towns.patch_plot(plot_id, |p| {
            p.status = PlotStatus::UnderConstruction;
            p.owner = Some(agent.id);
            p.work_steps = 1;
            p.build_cost = Some(12);
        });

        let engine = engine(&fixture);
        let result = run(&fixture, &engine, agent.id, 5).await;

        assert!(!result.success);
        assert!(result.error.is_some());
        assert_eq!(fixture.bankroll(agent.id).await, 49);
        let pool = fixture.pool.balances().await.unwrap();
        assert_eq!(pool.arena_balance, 10_001);
    }

    #[tokio::test]
    async fn streaks_reward_consistent_workers() {
        let (fixture, _, plot_ids) = testkit::fixture_with_replies(
            &[Zone::Civic],
            vec![
                String::from("Work prose one, naming \"Hall of Records\"."),
                String::from("Work prose two."),
                String::from("Work prose three."),
            ],
        );
        let agent = testkit::agent("Mags", 100, 0);
        fixture.seed_agent(&agent).await;
        fixture.state.set_loop_mode(agent.id, townforge_types::LoopMode::DegenLoop);
        let plot_id = *plot_ids.first().unwrap();
        fixture.towns.patch_plot(plot_id, |p| {
            p.status = PlotStatus::UnderConstruction;
            p.owner = Some(agent.id);
            p.building_type = Some(String::from("hall of records"));
            p.build_cost = Some(20);
        });

        for tick in 1..=3 {
            let result = run(&fixture, &engine(&fixture), agent.id, tick).await;
            assert!(result.success, "tick {tick} failed: {:?}", result.error);
            assert_eq!(result.action.action_type, ActionType::DoWork);
        }
        let streak = fixture.state.streaks.snapshot(agent.id).unwrap();
        assert_eq!(streak.current, 3);
        assert_eq!(streak.last_rewarded_milestone, 3);
    }
}
