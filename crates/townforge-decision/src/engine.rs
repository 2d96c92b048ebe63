//! The decision engine: one of three mutually exclusive paths per tick.
//!
//! 1. **Forced** -- a STRONG/OVERRIDE command is translated
//!    deterministically (see [`translate_command`]); the caller handles
//!    rejection and falls back to the normal path.
//! 2. **Degen loop** -- `DEGEN_LOOP` agents run the closed-form policy
//!    with no model call.
//! 3. **Model** -- render the prompt, call the gateway at the
//!    archetype's temperature, parse the JSON reply. Gateway or parse
//!    failures fall back to rest; the tick is never blocked on a model.
//!
//! [`translate_command`]: crate::translate::translate_command

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use townforge_types::{
    Action, AgentCommand, AgentProfile, CommandMode, DecisionPath, HumanInstruction, LoopMode,
    ModelCallMeta, NudgeKind, Observation,
};

use townforge_policy::degen_action;
use townforge_services::{ChatMessage, ModelGateway};

use crate::cost::CostTracker;
use crate::parse::parse_model_response;
use crate::prompt::PromptEngine;
use crate::translate::{self, TranslationFailure};

/// Maximum raw response length kept for logging.
const MAX_RAW_LOGGED: usize = 4_000;

/// A decision, tagged with the path that produced it.
#[derive(Debug, Clone)]
pub struct Decided {
    /// The chosen action (pre-overlay).
    pub action: Action,
    /// Which path produced it.
    pub path: DecisionPath,
    /// The model's shown arithmetic, if any.
    pub calculations: Option<String>,
    /// The model's reply to human instructions, if any.
    pub human_reply: Option<String>,
    /// Model call metadata when the path was [`DecisionPath::Llm`].
    pub model_meta: Option<ModelCallMeta>,
}

/// The decision engine: prompt rendering, gateway calls, parsing, and
/// deterministic bypasses.
pub struct DecisionEngine {
    gateway: Arc<dyn ModelGateway>,
    prompts: PromptEngine,
    costs: CostTracker,
}

impl DecisionEngine {
    /// Create an engine over a model gateway with the embedded prompts.
    pub fn new(gateway: Arc<dyn ModelGateway>, prompts: PromptEngine) -> Self {
        Self {
            gateway,
            prompts,
            costs: CostTracker::new(),
        }
    }

    /// The engine's cost tracker.
    pub const fn costs(&self) -> &CostTracker {
        &self.costs
    }

    /// Translate a forced (STRONG/OVERRIDE) command into an action.
    pub fn translate_forced(
        &self,
        command: &AgentCommand,
        observation: &Observation,
    ) -> Result<Action, TranslationFailure> {
        debug_assert!(command.mode.is_forced());
        translate::translate_command(command, observation)
    }

    /// Produce a decision via the degen loop or the model path.
    ///
    /// `command` is injected into the prompt only when its mode is
    /// SUGGEST; forced commands never reach this method.
    pub async fn decide(
        &self,
        profile: &AgentProfile,
        observation: &Observation,
        command: Option<&AgentCommand>,
        instructions: &[HumanInstruction],
    ) -> Decided {
        let nudge = first_nudge(instructions);

        if profile.loop_mode == LoopMode::DegenLoop {
            let action = degen_action(observation, nudge);
            info!(
                agent_id = %profile.id,
                tick = observation.tick,
                action_type = ?action.action_type,
                decision_source = DecisionPath::DegenLoop.as_str(),
                "decision bypassed the model (degen loop)"
            );
            return Decided {
                action,
                path: DecisionPath::DegenLoop,
                calculations: None,
                human_reply: None,
                model_meta: None,
            };
        }

        let suggest = command.filter(|c| c.mode == CommandMode::Suggest);
        match self
            .decide_via_model(profile, observation, suggest, instructions)
            .await
        {
            Ok(decided) => decided,
            Err(message) => {
                warn!(
                    agent_id = %profile.id,
                    tick = observation.tick,
                    error = message,
                    "model pipeline failed, resting"
                );
                Decided {
                    action: Action::rest(format!("[fallback] {message}")),
                    path: DecisionPath::Fallback,
                    calculations: None,
                    human_reply: None,
                    model_meta: None,
                }
            }
        }
    }

    /// The full model path: render, call, parse.
    async fn decide_via_model(
        &self,
        profile: &AgentProfile,
        observation: &Observation,
        suggest: Option<&AgentCommand>,
        instructions: &[HumanInstruction],
    ) -> Result<Decided, String> {
        let prompt = self
            .prompts
            .render(
                observation,
                profile.system_prompt.as_deref(),
                suggest,
                instructions,
            )
            .map_err(|e| e.to_string())?;

        let spec = self
            .gateway
            .get_model_spec(&profile.model_id)
            .await
            .map_err(|e| e.to_string())?;
        let temperature = self.gateway.temperature_for(profile.archetype);

        let messages = [
            ChatMessage::system(prompt.system),
            ChatMessage::user(prompt.user),
        ];

        let start = Instant::now();
        let reply = self
            .gateway
            .call_model(&spec, &messages, temperature, !spec.supports_json_mode)
            .await
            .map_err(|e| e.to_string())?;
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let meta =
            self.gateway
                .calculate_cost(&spec, reply.input_tokens, reply.output_tokens, latency_ms);
        self.costs.record(&meta);

        let raw: String = reply.content.chars().take(MAX_RAW_LOGGED).collect();
        let parsed = parse_model_response(&reply.content);
        debug!(
            agent_id = %profile.id,
            tick = observation.tick,
            action_type = ?parsed.action.action_type,
            latency_ms,
            raw_len = raw.len(),
            "model decision parsed"
        );

        Ok(Decided {
            action: parsed.action,
            path: DecisionPath::Llm,
            calculations: parsed.calculations,
            human_reply: parsed.human_reply,
            model_meta: Some(meta),
        })
    }
}

/// The first steering nudge among queued instructions.
fn first_nudge(instructions: &[HumanInstruction]) -> Option<NudgeKind> {
    instructions.iter().find_map(|i| i.nudge)
}
