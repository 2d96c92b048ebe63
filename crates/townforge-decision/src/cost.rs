//! Model cost accounting.
//!
//! Thread-safe tracker accumulating token usage and estimated cost
//! across all model calls made by the decision engine. All monetary
//! figures use [`Decimal`] cents; no floating point.

use std::sync::Mutex;

use rust_decimal::Decimal;
use townforge_types::ModelCallMeta;

/// Thread-safe model cost tracker. Safe to share via `Arc<CostTracker>`.
#[derive(Debug, Default)]
pub struct CostTracker {
    inner: Mutex<CostTrackerInner>,
}

/// Mutable accumulation state held inside the mutex.
#[derive(Debug, Default)]
struct CostTrackerInner {
    total_calls: u64,
    total_input_tokens: u64,
    total_output_tokens: u64,
    total_cost_cents: Decimal,
}

/// Snapshot of cost tracking state returned by [`CostTracker::summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostSummary {
    /// Total model calls recorded.
    pub total_calls: u64,
    /// Total input tokens across all calls.
    pub total_input_tokens: u64,
    /// Total output tokens across all calls.
    pub total_output_tokens: u64,
    /// Running estimated cost in cents.
    pub total_cost_cents: Decimal,
}

impl CostTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed model call.
    pub fn record(&self, meta: &ModelCallMeta) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.total_calls = inner.total_calls.saturating_add(1);
            inner.total_input_tokens = inner.total_input_tokens.saturating_add(meta.input_tokens);
            inner.total_output_tokens =
                inner.total_output_tokens.saturating_add(meta.output_tokens);
            inner.total_cost_cents = inner.total_cost_cents.saturating_add(meta.cost_cents);
        }
    }

    /// Snapshot the accumulated totals.
    pub fn summary(&self) -> CostSummary {
        self.inner.lock().map_or(
            CostSummary {
                total_calls: 0,
                total_input_tokens: 0,
                total_output_tokens: 0,
                total_cost_cents: Decimal::ZERO,
            },
            |inner| CostSummary {
                total_calls: inner.total_calls,
                total_input_tokens: inner.total_input_tokens,
                total_output_tokens: inner.total_output_tokens,
                total_cost_cents: inner.total_cost_cents,
            },
        )
    }
}
