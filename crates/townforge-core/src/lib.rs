//! The Townforge engine core: tick scheduling, observation assembly,
//! execution dispatch, command control, and the economy hooks.
//!
//! The engine is a library embedded in a larger host process. The host
//! supplies collaborator implementations (see `townforge-services`),
//! constructs a [`Scheduler`], and receives a [`TickResult`] per agent
//! per tick through the [`TickCallback`].
//!
//! # Modules
//!
//! - [`scheduler`] -- The periodic tick loop ([`Scheduler`])
//! - [`pipeline`] -- The per-agent tick pipeline
//! - [`observe`] -- Observation assembly
//! - [`exec`] -- The execution dispatcher
//! - [`command`] -- Command receipts and terminalization
//! - [`hooks`] -- Rescue, upkeep, repayment, streaks, fumble tax
//! - [`state`] -- Process-scoped mutable maps ([`EngineState`])
//! - [`services`] -- The collaborator bundle ([`Services`])
//! - [`error`] -- [`CoreError`]
//!
//! [`TickResult`]: townforge_types::TickResult

pub mod command;
pub mod error;
pub mod exec;
pub mod hooks;
pub mod observe;
pub mod pipeline;
pub mod scheduler;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod testkit;

pub use command::{build_receipt, rejection_receipt};
pub use error::CoreError;
pub use exec::{ExecCtx, ExecOutcome};
pub use observe::build_observation;
pub use pipeline::run_agent_pipeline;
pub use scheduler::{Scheduler, TickCallback, TickSummary};
pub use services::{pool_from_env, Services};
pub use state::EngineState;
