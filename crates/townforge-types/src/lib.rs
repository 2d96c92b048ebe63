//! Shared type definitions for the Townforge agent engine.
//!
//! This crate is the single source of truth for all types used across the
//! Townforge workspace: typed IDs, enumerations, agent actions, the
//! per-tick observation snapshot, owner commands and receipts, policy
//! overlay diagnostics, and per-tick results.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Enumeration types (archetypes, zones, actions, codes)
//! - [`agent`] -- Persistent agent state
//! - [`action`] -- The action union produced by decisions
//! - [`observation`] -- The per-tick world snapshot
//! - [`command`] -- Owner commands and compliance receipts
//! - [`policy`] -- Policy notes and the override-rate budget
//! - [`tick`] -- Tick results and decision records

pub mod action;
pub mod agent;
pub mod command;
pub mod enums;
pub mod ids;
pub mod observation;
pub mod policy;
pub mod tick;

// Re-export all public types at crate root for convenience.
pub use action::{Action, ActionParams};
pub use agent::{AgentProfile, SCRATCHPAD_CAPACITY};
pub use command::{
    AgentCommand, AuditMeta, CommandConstraints, CommandReceipt, HumanInstruction,
    ReceiptStatus,
};
pub use enums::{
    ActionType, Archetype, CommandMode, CommandStatus, Compliance, DecisionPath, EventKind,
    GameType, LoopMode, NudgeKind, PlotStatus, ReasonCode, SkillKind, TownStatus, WheelPhase,
    Zone,
};
pub use ids::{AgentId, CommandId, EventId, MatchId, PlotId, SwapId, TownId};
pub use observation::{
    GoalKind, GoalView, Observation, PeerView, PlotView, PoolSummary, RelationKind,
    RelationshipView, SelfView, SkillOutput, TownEvent, TownView, WheelWindow, WorldEventView,
    WorldStats,
};
pub use policy::{
    OverrideRate, PolicyCode, PolicyNote, PolicyTier, OVERRIDE_BUDGET_DEN, OVERRIDE_BUDGET_NUM,
    OVERRIDE_WINDOW,
};
pub use tick::{CommandMeta, DecisionRecord, ModelCallMeta, TickResult};
