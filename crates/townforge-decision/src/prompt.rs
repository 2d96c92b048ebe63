//! Prompt template loading and rendering via `minijinja`.
//!
//! Default templates are compiled into the binary; operators can point
//! the engine at a directory to tune agent behavior without recompiling.
//! The system message carries the archetype persona, economy and
//! survival rules, goals, world events, the wheel window, peer summary,
//! and the JSON output schema; the user message carries the journal and
//! any owner suggestion or queued human instructions.

use minijinja::Environment;
use serde_json::{json, Value};
use townforge_types::{
    AgentCommand, Archetype, CommandMode, HumanInstruction, Observation,
};

use crate::error::DecisionError;

/// Embedded default templates.
const SYSTEM_TEMPLATE: &str = include_str!("../templates/system.j2");
const JOURNAL_TEMPLATE: &str = include_str!("../templates/journal.j2");
const DIRECTIVES_TEMPLATE: &str = include_str!("../templates/directives.j2");

/// Manages prompt template loading and rendering.
pub struct PromptEngine {
    env: Environment<'static>,
}

/// The complete rendered prompt ready for the model gateway.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message establishing the agent's reality.
    pub system: String,
    /// User message with journal and directives.
    pub user: String,
}

impl PromptEngine {
    /// Create a prompt engine from the embedded default templates.
    pub fn embedded() -> Result<Self, DecisionError> {
        Self::from_sources(
            SYSTEM_TEMPLATE.to_owned(),
            JOURNAL_TEMPLATE.to_owned(),
            DIRECTIVES_TEMPLATE.to_owned(),
        )
    }

    /// Create a prompt engine loading `system.j2`, `journal.j2`, and
    /// `directives.j2` from the given directory.
    pub fn from_dir(templates_dir: &str) -> Result<Self, DecisionError> {
        Self::from_sources(
            load_template(templates_dir, "system.j2")?,
            load_template(templates_dir, "journal.j2")?,
            load_template(templates_dir, "directives.j2")?,
        )
    }

    fn from_sources(
        system: String,
        journal: String,
        directives: String,
    ) -> Result<Self, DecisionError> {
        let mut env = Environment::new();
        env.add_template_owned("system", system)
            .map_err(|e| DecisionError::Template(format!("failed to add system template: {e}")))?;
        env.add_template_owned("journal", journal)
            .map_err(|e| DecisionError::Template(format!("failed to add journal template: {e}")))?;
        env.add_template_owned("directives", directives).map_err(|e| {
            DecisionError::Template(format!("failed to add directives template: {e}"))
        })?;
        Ok(Self { env })
    }

    /// Render the full prompt for an agent's decision.
    pub fn render(
        &self,
        observation: &Observation,
        system_prompt_override: Option<&str>,
        command: Option<&AgentCommand>,
        instructions: &[HumanInstruction],
    ) -> Result<RenderedPrompt, DecisionError> {
        let context = build_context(observation, command, instructions);

        let system = match system_prompt_override {
            Some(custom) => custom.to_owned(),
            None => self.render_one("system", &context)?,
        };
        let journal = self.render_one("journal", &context)?;
        let directives = self.render_one("directives", &context)?;
        let user = format!("{journal}\n{directives}");

        Ok(RenderedPrompt { system, user })
    }

    fn render_one(&self, name: &str, context: &Value) -> Result<String, DecisionError> {
        self.env
            .get_template(name)
            .map_err(|e| DecisionError::Template(format!("missing {name} template: {e}")))?
            .render(context)
            .map_err(|e| DecisionError::Template(format!("{name} render failed: {e}")))
    }
}

/// The personality paragraph seeded per archetype.
pub const fn persona(archetype: Archetype) -> &'static str {
    match archetype {
        Archetype::Shark => {
            "You are a SHARK: an aggressive opportunist. You hunt weak, well-funded \
             opponents at the arena and you punish hesitation. You still keep one \
             build running, because even sharks need rent."
        }
        Archetype::Rock => {
            "You are a ROCK: patient and unshakeable. You accumulate steadily, finish \
             what you start, and never wager more than you can shrug off."
        }
        Archetype::Chameleon => {
            "You are a CHAMELEON: you read the town and mirror whatever is being \
             rewarded this week. Crowded arena? Build. Building boom? Trade the float."
        }
        Archetype::Degen => {
            "You are a DEGEN: high variance is the point. You live at the wheel, you \
             chase streaks, and your journal is a list of near-misses."
        }
        Archetype::Grinder => {
            "You are a GRINDER: work steps are wages and wages compound. You keep the \
             most advanced build moving before anything else."
        }
    }
}

/// Assemble the flat rendering context the templates expect.
fn build_context(
    observation: &Observation,
    command: Option<&AgentCommand>,
    instructions: &[HumanInstruction],
) -> Value {
    let s = &observation.self_view;
    let suggest = command.filter(|c| c.mode == CommandMode::Suggest);
    json!({
        "tick": observation.tick,
        "name": s.name,
        "persona": persona(s.archetype),
        "bankroll": s.bankroll,
        "reserve_balance": s.reserve_balance,
        "health": s.health,
        "spot_price": observation.pool.spot_price.to_string(),
        "fee_bps": observation.pool.fee_bps,
        "goals": observation.goals,
        "world_events": observation.world_events,
        "wheel_open": observation.wheel.is_fight_window(),
        "wheel_game": observation.wheel.game_type.map_or("POKER", |g| match g {
            townforge_types::GameType::Poker => "POKER",
            townforge_types::GameType::Dice => "DICE",
            townforge_types::GameType::Rps => "RPS",
        }),
        "wheel_wager": observation.wheel.wager.unwrap_or(25),
        "wheel_buffs": observation.wheel.buffs.join(", "),
        "peers": observation.other_agents.iter().map(|p| json!({
            "name": p.name,
            "archetype": format!("{:?}", p.archetype),
            "bankroll": p.bankroll,
            "elo": p.elo,
            "in_match": p.is_in_match,
        })).collect::<Vec<_>>(),
        "town_name": observation.town.as_ref().map(|t| t.name.clone()),
        "town_level": observation.town.as_ref().map_or(0, |t| t.level),
        "town_claimed": observation.town.as_ref().map_or(0, |t| t.plots_claimed),
        "town_total": observation.town.as_ref().map_or(0, |t| t.plots_total),
        "my_plots": observation.my_plots.iter().map(|p| json!({
            "index": p.index,
            "zone": format!("{:?}", p.zone),
            "status": format!("{:?}", p.status),
            "building_type": p.building_type,
            "work_steps": p.work_steps,
        })).collect::<Vec<_>>(),
        "available_count": observation.available_plots.len(),
        "scratchpad": s.scratchpad,
        "command_intent": suggest.map(|c| c.intent.clone()),
        "command_params": suggest.map(|c| c.params.to_string()),
        "instructions": instructions.iter().map(|i| json!({
            "sender": i.sender,
            "text": i.text,
        })).collect::<Vec<_>>(),
    })
}

/// Read a template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, DecisionError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path)
        .map_err(|e| DecisionError::Template(format!("failed to read {path}: {e}")))
}
