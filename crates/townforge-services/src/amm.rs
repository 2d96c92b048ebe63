//! AMM contract: pool summary and swaps.

use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use townforge_types::{AgentId, PoolSummary, SwapId};

use crate::error::ServiceError;

/// Which direction a swap runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapSide {
    /// Reserve in, $ARENA out.
    BuyArena,
    /// $ARENA in, reserve out.
    SellArena,
}

impl SwapSide {
    /// Wire name used in swap events.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BuyArena => "BUY_ARENA",
            Self::SellArena => "SELL_ARENA",
        }
    }
}

/// A settled swap as reported by the AMM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapExecution {
    /// Swap identifier.
    pub id: SwapId,
    /// Direction.
    pub side: SwapSide,
    /// Units paid in.
    pub amount_in: i64,
    /// Units received.
    pub amount_out: i64,
    /// Fee withheld by the pool.
    pub fee_amount: i64,
}

/// Contract for the off-chain AMM collaborator.
#[async_trait]
pub trait AmmService: Send + Sync {
    /// Current pool summary (spot price, fee, reserves).
    async fn get_pool_summary(&self) -> Result<PoolSummary, ServiceError>;

    /// Execute a swap for the agent. The AMM debits/credits the agent's
    /// balances inside its own transaction and may reject on clamp or
    /// slippage, surfacing [`ServiceError::SwapRejected`].
    async fn swap(
        &self,
        agent_id: AgentId,
        side: SwapSide,
        amount_in: i64,
        min_amount_out: Option<i64>,
    ) -> Result<SwapExecution, ServiceError>;
}

// ---------------------------------------------------------------------------
// In-memory stub
// ---------------------------------------------------------------------------

/// A fixed-price AMM stub: 1 reserve buys 1 $ARENA, minus the fee.
///
/// Set `reject_next` to make the next swap fail with a slippage error,
/// which is how dispatcher tests exercise the lenient skip path.
#[derive(Debug)]
pub struct StubAmm {
    summary: Mutex<PoolSummary>,
    reject_next: Mutex<bool>,
    swaps: Mutex<Vec<SwapExecution>>,
}

impl Default for StubAmm {
    fn default() -> Self {
        Self::new()
    }
}

impl StubAmm {
    /// Create a stub with a balanced 10k/10k pool at 100 bps fee.
    pub fn new() -> Self {
        Self {
            summary: Mutex::new(PoolSummary {
                spot_price: Decimal::ONE,
                fee_bps: 100,
                reserve_balance: 10_000,
                arena_balance: 10_000,
            }),
            reject_next: Mutex::new(false),
            swaps: Mutex::new(Vec::new()),
        }
    }

    /// Make the next swap fail with a slippage rejection.
    pub fn reject_next_swap(&self) {
        if let Ok(mut flag) = self.reject_next.lock() {
            *flag = true;
        }
    }

    /// Swaps executed so far (test assertion).
    pub fn swaps(&self) -> Vec<SwapExecution> {
        self.swaps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AmmService for StubAmm {
    async fn get_pool_summary(&self) -> Result<PoolSummary, ServiceError> {
        self.summary
            .lock()
            .map(|s| s.clone())
            .map_err(|_| ServiceError::downstream("amm stub poisoned"))
    }

    async fn swap(
        &self,
        agent_id: AgentId,
        side: SwapSide,
        amount_in: i64,
        min_amount_out: Option<i64>,
    ) -> Result<SwapExecution, ServiceError> {
        let _ = agent_id;
        {
            let mut flag = self
                .reject_next
                .lock()
                .map_err(|_| ServiceError::downstream("amm stub poisoned"))?;
            if *flag {
                *flag = false;
                return Err(ServiceError::SwapRejected {
                    message: String::from("slippage beyond tolerance"),
                });
            }
        }
        if amount_in <= 0 {
            return Err(ServiceError::SwapRejected {
                message: String::from("amount_in must be positive"),
            });
        }
        let fee_bps = self
            .summary
            .lock()
            .map(|s| i64::from(s.fee_bps))
            .map_err(|_| ServiceError::downstream("amm stub poisoned"))?;
        let fee_amount = amount_in.saturating_mul(fee_bps).checked_div(10_000).unwrap_or(0);
        let amount_out = amount_in.saturating_sub(fee_amount);
        if let Some(min_out) = min_amount_out
            && amount_out < min_out
        {
            return Err(ServiceError::SwapRejected {
                message: format!("amount_out {amount_out} below min {min_out}"),
            });
        }
        let execution = SwapExecution {
            id: SwapId::new(),
            side,
            amount_in,
            amount_out,
            fee_amount,
        };
        if let Ok(mut swaps) = self.swaps.lock() {
            swaps.push(execution.clone());
        }
        Ok(execution)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_swap_charges_fee() {
        let amm = StubAmm::new();
        let exec = amm
            .swap(AgentId::new(), SwapSide::BuyArena, 100, None)
            .await
            .unwrap();
        assert_eq!(exec.fee_amount, 1);
        assert_eq!(exec.amount_out, 99);
    }

    #[tokio::test]
    async fn stub_rejects_when_primed() {
        let amm = StubAmm::new();
        amm.reject_next_swap();
        let err = amm
            .swap(AgentId::new(), SwapSide::SellArena, 50, None)
            .await;
        assert!(matches!(err, Err(ServiceError::SwapRejected { .. })));
        // The rejection is one-shot.
        assert!(amm.swap(AgentId::new(), SwapSide::SellArena, 50, None).await.is_ok());
    }
}
