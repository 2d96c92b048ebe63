//! Collaborator contracts for the Townforge agent engine.
//!
//! The engine never talks to a database, an AMM, a match engine, or a
//! model provider directly -- it drives them through the traits in this
//! crate, which the host process implements. Each trait ships with an
//! in-memory stub used by the engine's own tests, following the
//! trait-plus-stub convention.
//!
//! # Modules
//!
//! - [`agents`] -- Agent persistence ([`AgentStore`])
//! - [`amm`] -- Off-chain AMM ([`AmmService`])
//! - [`arena`] -- PvP match engine ([`ArenaService`])
//! - [`commands`] -- Owner command queue ([`CommandQueue`])
//! - [`error`] -- Shared [`ServiceError`]
//! - [`model`] -- Language-model gateway ([`ModelGateway`])
//! - [`pool`] -- Transactional economy pool row ([`PoolStore`])
//! - [`skills`] -- Paid-skill oracle ([`SkillOracle`])
//! - [`social`] -- Social graph and goal tracker
//! - [`town`] -- Town/plot service ([`TownService`])
//! - [`world`] -- World events, wheel-of-fate, building visuals

pub mod agents;
pub mod amm;
pub mod arena;
pub mod commands;
pub mod error;
pub mod model;
pub mod pool;
pub mod skills;
pub mod social;
pub mod town;
pub mod world;

pub use agents::{AgentStore, InMemoryAgentStore};
pub use amm::{AmmService, StubAmm, SwapExecution, SwapSide};
pub use arena::{
    ArenaService, MatchRequest, MatchState, MatchStatus, ScriptedMove, StubArena,
};
pub use commands::{CommandQueue, StubCommandQueue};
pub use error::ServiceError;
pub use model::{
    default_temperature, cost_cents, ChatMessage, MessageRole, ModelGateway, ModelReply,
    ModelSpec, StubModelGateway,
};
pub use pool::{InMemoryPool, PoolBalances, PoolStore};
pub use skills::{SkillOracle, SkillReceipt, SkillRequest, StubSkillOracle};
pub use social::{GoalTracker, SocialGraph, StubGoalTracker, StubSocialGraph};
pub use town::{StubTownService, TownService};
pub use world::{
    BuildingVisual, BuildingVisuals, StubVisuals, StubWheel, StubWorldEvents, WheelOfFate,
    WorldEvents,
};
