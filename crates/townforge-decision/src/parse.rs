//! Model response parsing into typed actions.
//!
//! The model returns raw text (ideally JSON shaped as
//! `{"type", "reasoning", "calculations", "details", "humanReply"}`).
//! This module extracts that shape, coerces the untyped `details` bag
//! into typed [`ActionParams`] per variant, and handles malformed output
//! gracefully: anything unparseable becomes `rest` carrying a prefix of
//! the raw content as its reasoning.

use serde_json::Value;
use townforge_types::{Action, ActionParams, ActionType, GameType, SkillKind};
use tracing::warn;

use crate::error::DecisionError;

/// How much raw content to keep as reasoning when parsing fails.
const RAW_REASONING_PREFIX: usize = 160;

/// The parsed decision from a model response.
#[derive(Debug, Clone)]
pub struct ParsedDecision {
    /// The typed action.
    pub action: Action,
    /// The model's shown arithmetic, if any.
    pub calculations: Option<String>,
    /// The model's reply to queued human instructions, if any.
    pub human_reply: Option<String>,
}

/// Intermediate struct for deserializing the model's raw JSON response.
#[derive(Debug, serde::Deserialize)]
struct RawModelResponse {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    calculations: Option<String>,
    #[serde(default)]
    details: Value,
    #[serde(default, rename = "humanReply")]
    human_reply: Option<String>,
}

/// Parse a model response string into a [`ParsedDecision`].
///
/// Attempts multiple recovery strategies if the raw text is not clean
/// JSON:
/// 1. Direct `serde_json` deserialization
/// 2. Extract JSON from a markdown code block
/// 3. Strip trailing commas and retry
/// 4. Code block extraction plus comma stripping
///
/// If all attempts fail, returns `rest` with the raw content prefix as
/// reasoning.
pub fn parse_model_response(raw: &str) -> ParsedDecision {
    match try_parse(raw) {
        Ok(decision) => decision,
        Err(e) => {
            warn!(error = %e, raw_response = raw, "failed to parse model response, resting");
            let prefix: String = raw.chars().take(RAW_REASONING_PREFIX).collect();
            ParsedDecision {
                action: Action::rest(format!("[unparseable] {prefix}")),
                calculations: None,
                human_reply: None,
            }
        }
    }
}

/// Attempt to parse the response through the recovery strategies.
fn try_parse(raw: &str) -> Result<ParsedDecision, DecisionError> {
    let trimmed = raw.trim();

    // Strategy 1: direct parse
    if let Ok(parsed) = serde_json::from_str::<RawModelResponse>(trimmed) {
        return Ok(convert_raw_response(parsed));
    }

    // Strategy 2: extract from markdown code block
    if let Some(json_str) = extract_json_from_codeblock(trimmed)
        && let Ok(parsed) = serde_json::from_str::<RawModelResponse>(json_str)
    {
        return Ok(convert_raw_response(parsed));
    }

    // Strategy 3: strip trailing commas and retry
    let cleaned = strip_trailing_commas(trimmed);
    if let Ok(parsed) = serde_json::from_str::<RawModelResponse>(&cleaned) {
        return Ok(convert_raw_response(parsed));
    }

    // Strategy 4: extract from code block then strip commas
    if let Some(json_str) = extract_json_from_codeblock(trimmed) {
        let cleaned_inner = strip_trailing_commas(json_str);
        if let Ok(parsed) = serde_json::from_str::<RawModelResponse>(&cleaned_inner) {
            return Ok(convert_raw_response(parsed));
        }
    }

    Err(DecisionError::Parse(format!(
        "all parse strategies failed for: {trimmed}"
    )))
}

/// Convert a deserialized raw response into a typed decision.
///
/// Unknown action types route to `rest` rather than failing the tick.
fn convert_raw_response(raw: RawModelResponse) -> ParsedDecision {
    let reasoning = raw
        .reasoning
        .unwrap_or_else(|| String::from("(no reasoning given)"));

    let unknown_action_reasoning = reasoning.clone();
    let action = parse_action_type(&raw.action_type).map_or_else(
        || {
            warn!(action_type = raw.action_type, "unknown action type, resting");
            Action::rest(format!(
                "[unknown action {}] {unknown_action_reasoning}",
                raw.action_type
            ))
        },
        |action_type| {
            let params = params_from_details(action_type, &raw.details);
            Action::new(params, reasoning)
        },
    );

    ParsedDecision {
        action,
        calculations: raw.calculations,
        human_reply: raw.human_reply,
    }
}

/// Parse a string action type, tolerating case and separator drift.
pub fn parse_action_type(s: &str) -> Option<ActionType> {
    match s.trim().to_lowercase().replace('-', "_").as_str() {
        "buy_arena" | "buyarena" => Some(ActionType::BuyArena),
        "sell_arena" | "sellarena" => Some(ActionType::SellArena),
        "claim_plot" | "claimplot" => Some(ActionType::ClaimPlot),
        "start_build" | "startbuild" => Some(ActionType::StartBuild),
        "do_work" | "dowork" | "work" => Some(ActionType::DoWork),
        "complete_build" | "completebuild" => Some(ActionType::CompleteBuild),
        "play_arena" | "playarena" | "fight" => Some(ActionType::PlayArena),
        "transfer_arena" | "transferarena" => Some(ActionType::TransferArena),
        "buy_skill" | "buyskill" => Some(ActionType::BuySkill),
        "mine" => Some(ActionType::Mine),
        "rest" | "idle" | "none" => Some(ActionType::Rest),
        _ => None,
    }
}

/// Build typed [`ActionParams`] from the action type and the untyped
/// `details` bag. Missing or malformed fields degrade to `None`/defaults;
/// the dispatcher decides whether that is fatal.
pub fn params_from_details(action_type: ActionType, details: &Value) -> ActionParams {
    match action_type {
        ActionType::BuyArena => ActionParams::BuyArena {
            amount_in: int_field(details, &["amountIn", "amount_in", "amount"]).unwrap_or(0),
            why: string_field(details, &["why"]),
            next_action: string_field(details, &["nextAction", "next_action"]),
        },
        ActionType::SellArena => ActionParams::SellArena {
            amount_in: int_field(details, &["amountIn", "amount_in", "amount"]).unwrap_or(0),
            why: string_field(details, &["why"]),
            next_action: string_field(details, &["nextAction", "next_action"]),
        },
        ActionType::ClaimPlot => ActionParams::ClaimPlot {
            plot_index: index_field(details, &["plotIndex", "plot_index", "index"]),
        },
        ActionType::StartBuild => ActionParams::StartBuild {
            building_type: string_field(details, &["buildingType", "building_type"])
                .unwrap_or_else(|| String::from("modest structure")),
            plot_id: plot_id_field(details),
            plot_index: index_field(details, &["plotIndex", "plot_index", "index"]),
        },
        ActionType::DoWork => ActionParams::DoWork {
            plot_id: plot_id_field(details),
            plot_index: index_field(details, &["plotIndex", "plot_index", "index"]),
        },
        ActionType::CompleteBuild => ActionParams::CompleteBuild {
            plot_id: plot_id_field(details),
            plot_index: index_field(details, &["plotIndex", "plot_index", "index"]),
        },
        ActionType::PlayArena => ActionParams::PlayArena {
            game_type: string_field(details, &["gameType", "game_type"])
                .as_deref()
                .and_then(parse_game_type),
            wager: int_field(details, &["wager", "wagerAmount", "wager_amount"]),
            opponent: string_field(details, &["opponent", "opponentName", "opponent_name"]),
        },
        ActionType::TransferArena => ActionParams::TransferArena {
            to_name: string_field(details, &["to", "toName", "to_name", "recipient"])
                .unwrap_or_default(),
            amount: int_field(details, &["amount"]).unwrap_or(0),
            memo: string_field(details, &["memo", "note"]),
        },
        ActionType::BuySkill => ActionParams::BuySkill {
            skill: string_field(details, &["skill"])
                .as_deref()
                .and_then(parse_skill_kind)
                .unwrap_or(SkillKind::MarketDepth),
            question: string_field(details, &["question"]).unwrap_or_default(),
            why_now: string_field(details, &["whyNow", "why_now"]),
            expected_next_action: string_field(
                details,
                &["expectedNextAction", "expected_next_action"],
            ),
            if_then: string_field(details, &["ifThen", "if_then"]),
            params: details.get("params").cloned().unwrap_or(Value::Null),
        },
        ActionType::Mine => ActionParams::Mine,
        ActionType::Rest => ActionParams::Rest,
    }
}

/// Parse a game type string.
fn parse_game_type(s: &str) -> Option<GameType> {
    match s.trim().to_uppercase().as_str() {
        "POKER" => Some(GameType::Poker),
        "DICE" => Some(GameType::Dice),
        "RPS" => Some(GameType::Rps),
        _ => None,
    }
}

/// Parse a skill kind string.
fn parse_skill_kind(s: &str) -> Option<SkillKind> {
    match s.trim().to_uppercase().as_str() {
        "MARKET_DEPTH" => Some(SkillKind::MarketDepth),
        "BLUEPRINT_INDEX" => Some(SkillKind::BlueprintIndex),
        "SCOUT_REPORT" => Some(SkillKind::ScoutReport),
        _ => None,
    }
}

/// Read an integer field, tolerating numbers-as-strings.
fn int_field(details: &Value, keys: &[&str]) -> Option<i64> {
    let value = first_field(details, keys)?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Read a plot index field, rejecting negatives.
fn index_field(details: &Value, keys: &[&str]) -> Option<u32> {
    int_field(details, keys).and_then(|i| u32::try_from(i).ok())
}

/// Read a string field.
fn string_field(details: &Value, keys: &[&str]) -> Option<String> {
    let value = first_field(details, keys)?;
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// Read a plot id as a UUID string.
fn plot_id_field(details: &Value) -> Option<townforge_types::PlotId> {
    let raw = string_field(details, &["plotId", "plot_id"])?;
    uuid::Uuid::parse_str(&raw).ok().map(townforge_types::PlotId::from)
}

/// Return the first present key from the bag.
fn first_field<'a>(details: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| details.get(key))
}

/// Extract JSON from a markdown code block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let after_open = text.find("```").map(|i| i.saturating_add(3))?;
    let rest = text.get(after_open..)?;
    // Skip an optional language tag up to the first newline.
    let body_start = rest.find('\n').map_or(0, |i| i.saturating_add(1));
    let body = rest.get(body_start..)?;
    let end = body.find("```")?;
    body.get(..end).map(str::trim)
}

/// Remove trailing commas before `}` or `]`.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ',' {
            // Look ahead past whitespace for a closing brace/bracket.
            let mut lookahead = chars.clone();
            let mut next_meaningful = None;
            for n in &mut lookahead {
                if !n.is_whitespace() {
                    next_meaningful = Some(n);
                    break;
                }
            }
            if matches!(next_meaningful, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}
