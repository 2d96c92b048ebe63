//! Transactional store for the shared economy pool row.
//!
//! Every hook that debits the pool must re-check the floor inside the
//! store's own transaction: two agent pipelines can race on the same
//! row, and a check made outside the transaction is worthless. The
//! in-memory implementation models that by doing the check and the
//! mutation under one lock acquisition.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ServiceError;

/// Snapshot of the pool row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolBalances {
    /// Reserve-side balance.
    pub reserve_balance: i64,
    /// $ARENA-side balance.
    pub arena_balance: i64,
    /// Swap fee in basis points.
    pub fee_bps: u32,
}

/// Contract for the persistent pool row.
#[async_trait]
pub trait PoolStore: Send + Sync {
    /// Read the current balances.
    async fn balances(&self) -> Result<PoolBalances, ServiceError>;

    /// Withdraw up to `amount` $ARENA while keeping the balance at or
    /// above `floor`. Returns the amount actually taken (possibly 0).
    /// The headroom check and the mutation are one transaction.
    async fn withdraw_arena_above_floor(
        &self,
        amount: i64,
        floor: i64,
    ) -> Result<i64, ServiceError>;

    /// Debit exactly `amount` $ARENA if the floor allows it; returns
    /// whether the debit applied. All-or-nothing, one transaction.
    async fn debit_arena_above_floor(
        &self,
        amount: i64,
        floor: i64,
    ) -> Result<bool, ServiceError>;

    /// Credit $ARENA back into the pool.
    async fn credit_arena(&self, amount: i64) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// In-memory pool row with the same transactional guarantees the
/// database-backed store provides: check-then-mutate happens under one
/// lock acquisition.
#[derive(Debug)]
pub struct InMemoryPool {
    balances: Mutex<PoolBalances>,
}

impl InMemoryPool {
    /// Create a pool with the given starting balances.
    pub const fn new(reserve_balance: i64, arena_balance: i64, fee_bps: u32) -> Self {
        Self {
            balances: Mutex::new(PoolBalances {
                reserve_balance,
                arena_balance,
                fee_bps,
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, PoolBalances>, ServiceError> {
        self.balances
            .lock()
            .map_err(|_| ServiceError::downstream("pool poisoned"))
    }
}

#[async_trait]
impl PoolStore for InMemoryPool {
    async fn balances(&self) -> Result<PoolBalances, ServiceError> {
        Ok(*self.lock()?)
    }

    async fn withdraw_arena_above_floor(
        &self,
        amount: i64,
        floor: i64,
    ) -> Result<i64, ServiceError> {
        if amount <= 0 {
            return Ok(0);
        }
        let mut balances = self.lock()?;
        let headroom = balances.arena_balance.saturating_sub(floor).max(0);
        let taken = amount.min(headroom);
        balances.arena_balance = balances.arena_balance.saturating_sub(taken);
        Ok(taken)
    }

    async fn debit_arena_above_floor(
        &self,
        amount: i64,
        floor: i64,
    ) -> Result<bool, ServiceError> {
        if amount <= 0 {
            return Ok(true);
        }
        let mut balances = self.lock()?;
        if balances.arena_balance.saturating_sub(amount) < floor {
            return Ok(false);
        }
        balances.arena_balance = balances.arena_balance.saturating_sub(amount);
        Ok(true)
    }

    async fn credit_arena(&self, amount: i64) -> Result<(), ServiceError> {
        if amount <= 0 {
            return Ok(());
        }
        let mut balances = self.lock()?;
        balances.arena_balance = balances.arena_balance.saturating_add(amount);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn withdraw_clamps_to_headroom() {
        let pool = InMemoryPool::new(10_000, 1_020, 100);
        let taken = pool.withdraw_arena_above_floor(30, 1_000).await.unwrap();
        assert_eq!(taken, 20);
        assert_eq!(pool.balances().await.unwrap().arena_balance, 1_000);
        // Nothing left above the floor.
        assert_eq!(pool.withdraw_arena_above_floor(30, 1_000).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn debit_is_all_or_nothing() {
        let pool = InMemoryPool::new(10_000, 1_005, 100);
        assert!(!pool.debit_arena_above_floor(6, 1_000).await.unwrap());
        assert_eq!(pool.balances().await.unwrap().arena_balance, 1_005);
        assert!(pool.debit_arena_above_floor(5, 1_000).await.unwrap());
        assert_eq!(pool.balances().await.unwrap().arena_balance, 1_000);
    }

    #[tokio::test]
    async fn concurrent_debits_respect_floor() {
        use std::sync::Arc;

        let pool = Arc::new(InMemoryPool::new(10_000, 1_100, 100));
        let mut tasks = Vec::new();
        for _ in 0..50 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move {
                pool.debit_arena_above_floor(10, 1_000).await.unwrap_or(false)
            }));
        }
        let mut applied = 0_u32;
        for task in tasks {
            if task.await.unwrap_or(false) {
                applied = applied.saturating_add(1);
            }
        }
        // Only 100 units of headroom existed.
        assert_eq!(applied, 10);
        assert_eq!(pool.balances().await.unwrap().arena_balance, 1_000);
    }
}
