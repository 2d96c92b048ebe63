//! Model-driven decision pipeline for the Townforge agent engine.
//!
//! Turns an [`Observation`] into an [`Action`] through one of three
//! mutually exclusive paths: forced command translation, the degen-loop
//! policy, or a rendered prompt sent through the model gateway and
//! parsed back with recovery strategies.
//!
//! # Modules
//!
//! - [`cost`] -- Model cost accounting ([`CostTracker`])
//! - [`engine`] -- The decision engine ([`DecisionEngine`])
//! - [`error`] -- [`DecisionError`]
//! - [`parse`] -- Model JSON parsing ([`parse_model_response`])
//! - [`prompt`] -- Prompt templates ([`PromptEngine`])
//! - [`translate`] -- Forced-command translation ([`translate_command`])
//!
//! [`Observation`]: townforge_types::Observation
//! [`Action`]: townforge_types::Action
//! [`translate_command`]: translate::translate_command
//! [`parse_model_response`]: parse::parse_model_response

pub mod cost;
pub mod engine;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod translate;

pub use cost::{CostSummary, CostTracker};
pub use engine::{Decided, DecisionEngine};
pub use error::DecisionError;
pub use parse::{parse_action_type, parse_model_response, params_from_details, ParsedDecision};
pub use prompt::{persona, PromptEngine, RenderedPrompt};
pub use translate::{translate_command, TranslationFailure};
