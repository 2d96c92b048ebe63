//! The tunable constants block for the whole economy.
//!
//! Every number an operator might want to adjust lives here, named.
//! The cost formulas take the world multipliers as [`Decimal`] and round
//! to integer $ARENA at the end; there is no floating point anywhere in
//! the economic math.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use townforge_types::Zone;

// ---------------------------------------------------------------------------
// Solvency rescue
// ---------------------------------------------------------------------------

/// Bankroll at or below which an agent becomes rescue-eligible.
pub const SOLVENCY_RESCUE_TRIGGER_BANKROLL: i64 = 35;

/// Reserve at or below which an agent becomes rescue-eligible.
pub const SOLVENCY_RESCUE_TRIGGER_RESERVE: i64 = 5;

/// $ARENA granted per rescue (capped by pool headroom).
pub const SOLVENCY_RESCUE_ARENA: i64 = 30;

/// Minimum ticks between rescues for one agent.
pub const SOLVENCY_RESCUE_COOLDOWN_TICKS: u64 = 3;

/// Health restored alongside a rescue grant.
pub const SOLVENCY_RESCUE_HEALTH_BUMP: i32 = 3;

/// Length of the sliding rescue window, in ticks.
pub const SOLVENCY_RESCUE_WINDOW_TICKS: u64 = 16;

/// Maximum rescues per agent per window.
pub const SOLVENCY_RESCUE_MAX_PER_WINDOW: u32 = 2;

/// Repayment rate on rescue debt, in basis points of repayable surplus.
pub const SOLVENCY_RESCUE_REPAYMENT_BPS: i64 = 2500;

/// Bankroll floor an agent keeps while repaying rescue debt.
pub const SOLVENCY_RESCUE_REPAYMENT_FLOOR: i64 = 90;

/// Invariant lower bound on the shared pool's $ARENA balance.
pub const SOLVENCY_POOL_FLOOR: i64 = 1_000;

// ---------------------------------------------------------------------------
// Upkeep and fumbles
// ---------------------------------------------------------------------------

/// Base per-tick upkeep before the world multiplier.
pub const UPKEEP_BASE: i64 = 1;

/// Health damage when upkeep is missed and the agent is fully broke.
pub const UPKEEP_DAMAGE_BROKE: i32 = 2;

/// Health damage when upkeep is missed with funds elsewhere.
pub const UPKEEP_DAMAGE_DEFAULT: i32 = 4;

/// $ARENA recycled into the pool per caught execution error.
pub const FUMBLE_TAX_ARENA: i64 = 1;

/// Minimum bankroll an agent keeps after a fumble tax.
pub const FUMBLE_TAX_MIN_REMAINING: i64 = 4;

// ---------------------------------------------------------------------------
// Work and completion
// ---------------------------------------------------------------------------

/// Minimum work wage per submitted step.
pub const WORK_WAGE_MIN: i64 = 3;

/// Maximum work wage per submitted step.
pub const WORK_WAGE_MAX: i64 = 6;

/// Minimum completion bonus.
pub const COMPLETION_BONUS_MIN: i64 = 6;

/// Maximum completion bonus.
pub const COMPLETION_BONUS_MAX: i64 = 24;

/// Completion bonus rate in basis points of the build cost.
pub const COMPLETION_BONUS_BPS: i64 = 4_500;

// ---------------------------------------------------------------------------
// Retention streaks
// ---------------------------------------------------------------------------

/// Non-rest streak milestones, paired with their one-shot rewards.
pub const STREAK_MILESTONES: [(u32, i64); 4] = [(3, 6), (5, 10), (8, 14), (13, 20)];

// ---------------------------------------------------------------------------
// Claim and build costs
// ---------------------------------------------------------------------------

/// Base claim cost before level and scarcity scaling.
pub const CLAIM_COST_BASE: i64 = 6;

/// Claim cost added per town level.
pub const CLAIM_COST_PER_LEVEL: i64 = 2;

/// One extra $ARENA of claim cost per this many already-claimed plots.
pub const CLAIM_SCARCITY_DIVISOR: i64 = 2;

/// Bootstrap agents (no owned plots) pay this share of costs, in basis
/// points -- a roughly 55% discount.
pub const BOOTSTRAP_COST_BPS: i64 = 4_500;

/// Build cost denominator: each town level adds `1/BUILD_LEVEL_DIVISOR`
/// to the level multiplier.
pub const BUILD_LEVEL_DIVISOR: i64 = 4;

/// Base build cost per zone.
pub const fn zone_base_cost(zone: Zone) -> i64 {
    match zone {
        Zone::Residential => 10,
        Zone::Commercial | Zone::Industrial => 14,
        Zone::Entertainment => 16,
        Zone::Civic => 18,
    }
}

/// Default PvP wager when none is announced.
pub const DEFAULT_ARENA_WAGER: i64 = 25;

/// Minimum bankroll to enter a PvP match.
pub const ARENA_MIN_BANKROLL: i64 = 10;

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Round a [`Decimal`] to the nearest integer $ARENA, never below zero.
fn round_arena(value: Decimal) -> i64 {
    value.round().to_i64().unwrap_or(0).max(0)
}

/// Per-tick upkeep: `max(1, round(UPKEEP_BASE * world_multiplier))`.
pub fn upkeep_cost(world_multiplier: Decimal) -> i64 {
    round_arena(Decimal::from(UPKEEP_BASE).saturating_mul(world_multiplier)).max(1)
}

/// Estimated claim cost for a plot.
///
/// Scales with town level and scarcity (more claimed plots cost more);
/// bootstrap agents pay [`BOOTSTRAP_COST_BPS`] of the full figure.
pub fn claim_cost(town_level: u32, claimed_plots: u32, bootstrap: bool) -> i64 {
    let level = i64::from(town_level);
    let scarcity = i64::from(claimed_plots)
        .checked_div(CLAIM_SCARCITY_DIVISOR)
        .unwrap_or(0);
    let full = CLAIM_COST_BASE
        .saturating_add(level.saturating_mul(CLAIM_COST_PER_LEVEL))
        .saturating_add(scarcity);
    if bootstrap {
        apply_bps(full, BOOTSTRAP_COST_BPS).max(1)
    } else {
        full
    }
}

/// Build cost for a zone at a town level under the world cost multiplier.
///
/// `zone_base * (1 + level / BUILD_LEVEL_DIVISOR) * world_multiplier`,
/// with the bootstrap discount applied last.
pub fn build_cost(
    zone: Zone,
    town_level: u32,
    world_multiplier: Decimal,
    bootstrap: bool,
) -> i64 {
    let base = Decimal::from(zone_base_cost(zone));
    let level_mult = Decimal::ONE.saturating_add(
        Decimal::from(town_level)
            .checked_div(Decimal::from(BUILD_LEVEL_DIVISOR))
            .unwrap_or(Decimal::ZERO),
    );
    let full = round_arena(base.saturating_mul(level_mult).saturating_mul(world_multiplier));
    if bootstrap {
        apply_bps(full, BOOTSTRAP_COST_BPS).max(1)
    } else {
        full.max(1)
    }
}

/// Work wage per submitted step:
/// `clamp(3..6, ceil(max(8, build_cost) / (min_steps * 2)))`.
pub fn work_wage(build_cost: i64, zone: Zone) -> i64 {
    let numerator = build_cost.max(8);
    let denominator = i64::from(zone.min_work_steps()).saturating_mul(2).max(1);
    let raw = numerator
        .saturating_add(denominator.saturating_sub(1))
        .checked_div(denominator)
        .unwrap_or(WORK_WAGE_MIN);
    raw.clamp(WORK_WAGE_MIN, WORK_WAGE_MAX)
}

/// Completion bonus: `clamp(6..24, round(0.45 * max(10, build_cost)))`.
pub fn completion_bonus(build_cost: i64) -> i64 {
    let raw = apply_bps(build_cost.max(10), COMPLETION_BONUS_BPS);
    raw.clamp(COMPLETION_BONUS_MIN, COMPLETION_BONUS_MAX)
}

/// Apply a basis-point rate to an amount, rounding to nearest.
fn apply_bps(amount: i64, bps: i64) -> i64 {
    let product = amount.saturating_mul(bps).saturating_add(5_000);
    product.checked_div(10_000).unwrap_or(0)
}
