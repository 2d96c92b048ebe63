//! Economy bookkeeping for the Townforge agent engine.
//!
//! Everything that moves $ARENA outside the AMM lives here: the named
//! constants block, the pool bootstrap configuration, the solvency
//! rescue ledger, and the non-rest retention streak book. The pool row
//! itself is persisted by the host behind the `PoolStore` contract; this
//! crate supplies the figures and the in-memory counters.
//!
//! # Modules
//!
//! - [`constants`] -- Named constants and cost/wage/bonus formulas
//! - [`config`] -- `ECONOMY_*` environment configuration
//! - [`rescue`] -- Solvency rescue ledger ([`RescueLedger`])
//! - [`streak`] -- Retention streaks ([`StreakBook`])
//! - [`error`] -- [`EconomyError`]

pub mod config;
pub mod constants;
pub mod error;
pub mod rescue;
pub mod streak;

pub use config::EconomyConfig;
pub use constants::{
    build_cost, claim_cost, completion_bonus, upkeep_cost, work_wage, zone_base_cost,
    ARENA_MIN_BANKROLL, BOOTSTRAP_COST_BPS, CLAIM_COST_BASE, CLAIM_COST_PER_LEVEL,
    COMPLETION_BONUS_MAX, COMPLETION_BONUS_MIN, DEFAULT_ARENA_WAGER, FUMBLE_TAX_ARENA,
    FUMBLE_TAX_MIN_REMAINING, SOLVENCY_POOL_FLOOR, SOLVENCY_RESCUE_ARENA,
    SOLVENCY_RESCUE_COOLDOWN_TICKS, SOLVENCY_RESCUE_HEALTH_BUMP,
    SOLVENCY_RESCUE_MAX_PER_WINDOW, SOLVENCY_RESCUE_REPAYMENT_BPS,
    SOLVENCY_RESCUE_REPAYMENT_FLOOR, SOLVENCY_RESCUE_TRIGGER_BANKROLL,
    SOLVENCY_RESCUE_TRIGGER_RESERVE, SOLVENCY_RESCUE_WINDOW_TICKS, STREAK_MILESTONES,
    UPKEEP_BASE, UPKEEP_DAMAGE_BROKE, UPKEEP_DAMAGE_DEFAULT, WORK_WAGE_MAX, WORK_WAGE_MIN,
};
pub use error::EconomyError;
pub use rescue::{RescueGrant, RescueLedger};
pub use streak::{NonRestStreak, StreakBook, StreakReward};
