//! Deterministic decision logic for the Townforge agent engine.
//!
//! Three consumers share this crate: the degen loop (a model-free policy
//! for `DEGEN_LOOP` agents), the soft overlay (budgeted corrections on
//! top of model decisions), and the manual planner (the pure mapping
//! operators use to issue commands blind). All three read only the
//! per-tick [`Observation`] snapshot.
//!
//! # Modules
//!
//! - [`concept`] -- Default building concepts per zone
//! - [`degen`] -- The degen-loop policy ([`degen_action`])
//! - [`overlay`] -- The soft overlay chain ([`apply_overlays`])
//! - [`planner`] -- The operator planner ([`plan_deterministic_action`])
//! - [`window`] -- Override-rate history ([`OverrideHistory`])
//!
//! [`Observation`]: townforge_types::Observation

pub mod concept;
pub mod degen;
pub mod overlay;
pub mod planner;
pub mod window;

pub use concept::default_building_concept;
pub use degen::degen_action;
pub use overlay::{apply_overlays, OverlayOutcome, TRADE_COOLDOWN_TICKS};
pub use planner::{
    plan_deterministic_action, PlanRejection, PlannedAction, TRADE_BUY_MAX_BANKROLL,
    TRADE_BUY_MIN_RESERVE, TRADE_SELL_KEEP, TRADE_SELL_MIN_AMOUNT, TRADE_SELL_MIN_BANKROLL,
};
pub use window::OverrideHistory;
