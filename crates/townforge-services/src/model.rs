//! Language-model gateway contract.
//!
//! The gateway hides providers, retries, and transport; the engine sends
//! rendered messages and receives raw text plus token counts. Cost math
//! uses [`Decimal`] cents per million tokens, never floating point.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use townforge_types::{Archetype, ModelCallMeta};

use crate::error::ServiceError;

/// Resolved pricing and capabilities for one model id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// Stable model identifier (what agents store).
    pub model_id: String,
    /// Provider-facing model name.
    pub model_name: String,
    /// Cents per million input tokens.
    pub input_cents_per_mtok: Decimal,
    /// Cents per million output tokens.
    pub output_cents_per_mtok: Decimal,
    /// Whether the provider supports forced JSON output.
    pub supports_json_mode: bool,
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    /// System instruction.
    System,
    /// User turn.
    User,
    /// Assistant turn.
    Assistant,
}

/// One message in the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message role.
    pub role: MessageRole,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// A completed model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    /// Raw response text.
    pub content: String,
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens produced.
    pub output_tokens: u64,
}

/// Contract for the language-model gateway collaborator.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Resolve a model id to its spec.
    async fn get_model_spec(&self, model_id: &str) -> Result<ModelSpec, ServiceError>;

    /// Send messages to the model and return the raw reply.
    async fn call_model(
        &self,
        spec: &ModelSpec,
        messages: &[ChatMessage],
        temperature: f32,
        force_no_json_mode: bool,
    ) -> Result<ModelReply, ServiceError>;

    /// Compute the cost record for a completed call.
    fn calculate_cost(
        &self,
        spec: &ModelSpec,
        input_tokens: u64,
        output_tokens: u64,
        latency_ms: u64,
    ) -> ModelCallMeta;

    /// Decision temperature for an archetype.
    fn temperature_for(&self, archetype: Archetype) -> f32;
}

/// Shared cost formula: `tokens * cents_per_mtok / 1_000_000` per side.
pub fn cost_cents(spec: &ModelSpec, input_tokens: u64, output_tokens: u64) -> Decimal {
    let million = Decimal::from(1_000_000_u64);
    let input = Decimal::from(input_tokens)
        .saturating_mul(spec.input_cents_per_mtok)
        .checked_div(million)
        .unwrap_or(Decimal::ZERO);
    let output = Decimal::from(output_tokens)
        .saturating_mul(spec.output_cents_per_mtok)
        .checked_div(million)
        .unwrap_or(Decimal::ZERO);
    input.saturating_add(output)
}

/// Default per-archetype temperatures.
///
/// Sharks and degens run hot; rocks stay conservative.
pub const fn default_temperature(archetype: Archetype) -> f32 {
    match archetype {
        Archetype::Rock => 0.5,
        Archetype::Grinder => 0.6,
        Archetype::Chameleon => 0.75,
        Archetype::Shark => 0.85,
        Archetype::Degen => 0.95,
    }
}

// ---------------------------------------------------------------------------
// In-memory stub
// ---------------------------------------------------------------------------

/// A gateway stub replaying queued responses.
///
/// Each `call_model` pops the next queued string; an empty queue returns
/// a gateway error, which is how pipeline tests exercise the fallback
/// path.
#[derive(Debug, Default)]
pub struct StubModelGateway {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl StubModelGateway {
    /// Create a stub that replays the given responses in order.
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Messages sent so far (test assertion).
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelGateway for StubModelGateway {
    async fn get_model_spec(&self, model_id: &str) -> Result<ModelSpec, ServiceError> {
        Ok(ModelSpec {
            model_id: model_id.to_owned(),
            model_name: format!("stub/{model_id}"),
            input_cents_per_mtok: Decimal::from(30),
            output_cents_per_mtok: Decimal::from(88),
            supports_json_mode: true,
        })
    }

    async fn call_model(
        &self,
        spec: &ModelSpec,
        messages: &[ChatMessage],
        temperature: f32,
        force_no_json_mode: bool,
    ) -> Result<ModelReply, ServiceError> {
        let _ = (spec, temperature, force_no_json_mode);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let mut replies = self
            .replies
            .lock()
            .map_err(|_| ServiceError::Model {
                message: String::from("gateway stub poisoned"),
            })?;
        let content = replies.pop_front().ok_or_else(|| ServiceError::Model {
            message: String::from("no scripted reply left"),
        })?;
        let output_tokens = u64::try_from(content.len()).unwrap_or(0).saturating_div(4);
        Ok(ModelReply {
            content,
            input_tokens: 800,
            output_tokens,
        })
    }

    fn calculate_cost(
        &self,
        spec: &ModelSpec,
        input_tokens: u64,
        output_tokens: u64,
        latency_ms: u64,
    ) -> ModelCallMeta {
        ModelCallMeta {
            model: spec.model_name.clone(),
            input_tokens,
            output_tokens,
            cost_cents: cost_cents(spec, input_tokens, output_tokens),
            latency_ms,
        }
    }

    fn temperature_for(&self, archetype: Archetype) -> f32 {
        default_temperature(archetype)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cost_scales_with_tokens() {
        let spec = ModelSpec {
            model_id: String::from("m"),
            model_name: String::from("stub/m"),
            input_cents_per_mtok: Decimal::from(100),
            output_cents_per_mtok: Decimal::from(1000),
            supports_json_mode: true,
        };
        // 1M input at 100 cents + 100k output at 1000 cents = 200 cents.
        let cents = cost_cents(&spec, 1_000_000, 100_000);
        assert_eq!(cents, Decimal::from(200));
    }

    #[tokio::test]
    async fn stub_replays_and_then_errors() {
        let gateway = StubModelGateway::with_replies(vec![String::from("{\"type\":\"rest\"}")]);
        let spec = gateway.get_model_spec("m").await.unwrap();
        let reply = gateway
            .call_model(&spec, &[ChatMessage::user("hi")], 0.5, false)
            .await
            .unwrap();
        assert!(reply.content.contains("rest"));
        assert!(gateway
            .call_model(&spec, &[ChatMessage::user("hi")], 0.5, false)
            .await
            .is_err());
    }

    #[test]
    fn degen_runs_hotter_than_rock() {
        assert!(default_temperature(Archetype::Degen) > default_temperature(Archetype::Rock));
    }
}
