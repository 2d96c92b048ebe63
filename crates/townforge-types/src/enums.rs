//! Enumeration types for the Townforge agent engine.
//!
//! Wire representations follow the host conventions: action types are
//! `snake_case` (they appear verbatim in LLM JSON responses), while
//! archetypes, zones, command fields, and event kinds are
//! `SCREAMING_SNAKE_CASE` (they appear in persisted rows and receipts).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Agent identity
// ---------------------------------------------------------------------------

/// Personality tag used to seed prompts and model temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Archetype {
    /// Aggressive PvP-first opportunist.
    Shark,
    /// Patient accumulator; builds before it fights.
    Rock,
    /// Mirrors whatever the town is rewarding this week.
    Chameleon,
    /// High-variance gambler; lives at the wheel.
    Degen,
    /// Steady worker; finishes what it starts.
    Grinder,
}

/// Per-agent policy switch: `DegenLoop` agents bypass the language model
/// entirely and run the deterministic loop policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopMode {
    /// Normal model-driven decisions.
    #[default]
    Default,
    /// Deterministic degen-loop policy, no model calls.
    DegenLoop,
}

// ---------------------------------------------------------------------------
// Town geography
// ---------------------------------------------------------------------------

/// Zone classification of a plot. Zones differ in build cost and the
/// minimum number of work steps before a build can complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Zone {
    /// Housing; cheapest and fastest to build.
    Residential,
    /// Shops and trade floors.
    Commercial,
    /// Town halls, schools, shrines; slowest to build.
    Civic,
    /// Workshops and warehouses.
    Industrial,
    /// Taverns, arenas, theatres.
    Entertainment,
}

impl Zone {
    /// Minimum number of submitted work steps before `complete_build`
    /// is accepted for a plot in this zone.
    pub const fn min_work_steps(self) -> u32 {
        match self {
            Self::Residential => 3,
            Self::Commercial | Self::Industrial | Self::Entertainment => 4,
            Self::Civic => 5,
        }
    }
}

/// Lifecycle status of a town.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TownStatus {
    /// Plots are still being claimed and built.
    Building,
    /// Every plot is complete; the town generates yield.
    Complete,
    /// Retired town kept for history.
    Archived,
}

/// Lifecycle status of a single plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlotStatus {
    /// Unclaimed and claimable.
    Empty,
    /// Claimed but no build started.
    Claimed,
    /// A build is in progress.
    UnderConstruction,
    /// The build is finished.
    Complete,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The discriminant of an agent [`Action`].
///
/// Serialized in `snake_case` because these strings appear verbatim in
/// the model's JSON output (`{"type": "claim_plot", ...}`).
///
/// [`Action`]: crate::action::Action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Swap reserve currency into $ARENA via the AMM.
    BuyArena,
    /// Swap $ARENA back into reserve currency.
    SellArena,
    /// Claim an empty plot in the active town.
    ClaimPlot,
    /// Start a build on a claimed plot.
    StartBuild,
    /// Submit one design work step to an under-construction plot.
    DoWork,
    /// Complete a build that has enough work steps.
    CompleteBuild,
    /// Challenge another agent to a wagered PvP match.
    PlayArena,
    /// Send $ARENA to another agent by name.
    TransferArena,
    /// Buy a paid-skill report from the oracle.
    BuySkill,
    /// Legacy action; always redirected by the dispatcher.
    Mine,
    /// Do nothing this tick.
    Rest,
}

impl ActionType {
    /// The `snake_case` wire name of this action type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BuyArena => "buy_arena",
            Self::SellArena => "sell_arena",
            Self::ClaimPlot => "claim_plot",
            Self::StartBuild => "start_build",
            Self::DoWork => "do_work",
            Self::CompleteBuild => "complete_build",
            Self::PlayArena => "play_arena",
            Self::TransferArena => "transfer_arena",
            Self::BuySkill => "buy_skill",
            Self::Mine => "mine",
            Self::Rest => "rest",
        }
    }

    /// Whether this action spends $ARENA when it executes.
    pub const fn is_spending(self) -> bool {
        matches!(
            self,
            Self::SellArena
                | Self::ClaimPlot
                | Self::StartBuild
                | Self::PlayArena
                | Self::TransferArena
                | Self::BuySkill
        )
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// How forcefully an owner command binds the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandMode {
    /// Injected into the model prompt; never overrides the decision.
    Suggest,
    /// Bypasses the decision engine; executes strictly.
    Strong,
    /// Like `Strong`, but issued with operator authority; compliance
    /// receipts treat both identically.
    Override,
}

impl CommandMode {
    /// Whether this mode bypasses the decision engine and executes
    /// strictly (no redirects).
    pub const fn is_forced(self) -> bool {
        matches!(self, Self::Strong | Self::Override)
    }
}

/// Lifecycle status of an owner command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    /// Waiting to be accepted by the agent's next tick.
    Queued,
    /// Picked up by the current tick.
    Accepted,
    /// Executed; see the receipt for compliance.
    Executed,
    /// Rejected; see the receipt for the reason code.
    Rejected,
    /// Expired before any tick accepted it.
    Expired,
    /// Cancelled by the issuer.
    Cancelled,
}

/// How closely the executed action matched the command's expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Compliance {
    /// Executed action type matched the expected type.
    Full,
    /// Executed successfully but as a different action type.
    Partial,
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Semantic reason codes carried by rejections, receipts, and planner
/// failures. One code per failure kind in the engine's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Command intent could not be translated into an action.
    InvalidIntent,
    /// A numeric parameter was missing, negative, or non-integer.
    InvalidAmount,
    /// A plot index was missing or out of range.
    InvalidPlotIndex,
    /// The named target (plot, agent, command subject) is not available.
    TargetUnavailable,
    /// The agent owns no claimed plot to act on.
    NoClaimedPlot,
    /// No build is under construction for the agent.
    NoActiveBuild,
    /// No eligible PvP opponent exists.
    NoOpponents,
    /// The build has not accumulated enough work steps.
    NotReady,
    /// The agent's reserve balance is zero.
    NoReserve,
    /// The agent's $ARENA bankroll is zero.
    NoArena,
    /// There is no active town.
    NoTown,
    /// The agent cannot afford the action.
    InsufficientArena,
    /// A rule or command constraint was violated.
    ConstraintViolation,
    /// The AMM rejected the swap (clamp or slippage).
    AmmSlippage,
    /// The match engine refused to create the match.
    MatchCreateFailed,
    /// The match ran past the turbo-loop deadline and was cancelled.
    MatchTimeout,
    /// Execution failed downstream of validation.
    ExecutionFailed,
    /// Execution threw an unexpected error.
    ExecutionError,
    /// The agent's health is zero; only rest is permitted.
    AgentIncapacitated,
}

impl ReasonCode {
    /// The `SCREAMING_SNAKE_CASE` wire name of this code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidIntent => "INVALID_INTENT",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InvalidPlotIndex => "INVALID_PLOT_INDEX",
            Self::TargetUnavailable => "TARGET_UNAVAILABLE",
            Self::NoClaimedPlot => "NO_CLAIMED_PLOT",
            Self::NoActiveBuild => "NO_ACTIVE_BUILD",
            Self::NoOpponents => "NO_OPPONENTS",
            Self::NotReady => "NOT_READY",
            Self::NoReserve => "NO_RESERVE",
            Self::NoArena => "NO_ARENA",
            Self::NoTown => "NO_TOWN",
            Self::InsufficientArena => "INSUFFICIENT_ARENA",
            Self::ConstraintViolation => "CONSTRAINT_VIOLATION",
            Self::AmmSlippage => "AMM_SLIPPAGE",
            Self::MatchCreateFailed => "MATCH_CREATE_FAILED",
            Self::MatchTimeout => "MATCH_TIMEOUT",
            Self::ExecutionFailed => "EXECUTION_FAILED",
            Self::ExecutionError => "EXECUTION_ERROR",
            Self::AgentIncapacitated => "AGENT_INCAPACITATED",
        }
    }
}

impl core::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Kind of a logged town event.
///
/// The kinds marked *private* are stripped from agent observations --
/// agents must not see each other's paid-skill output or private chatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A plot was claimed.
    PlotClaimed,
    /// A build was started.
    BuildStarted,
    /// A work step was submitted.
    WorkSubmitted,
    /// A build was completed.
    BuildCompleted,
    /// A PvP match resolved.
    MatchResolved,
    /// An AMM swap executed.
    Swap,
    /// A world event pulsed.
    WorldEvent,
    /// A solvency rescue was issued.
    SolvencyRescue,
    /// Upkeep grace or damage was applied.
    Upkeep,
    /// Town yield was distributed.
    YieldDistributed,
    /// Paid-skill oracle output (*private*).
    X402Skill,
    /// Agent-to-agent chat (*private*).
    AgentChat,
    /// A relationship score changed (*private*).
    RelationshipChange,
    /// An agent-to-agent transfer (*private*).
    AgentTrade,
}

impl EventKind {
    /// Whether this kind is private and must be filtered from
    /// agent observations.
    pub const fn is_private(self) -> bool {
        matches!(
            self,
            Self::X402Skill | Self::AgentChat | Self::RelationshipChange | Self::AgentTrade
        )
    }
}

// ---------------------------------------------------------------------------
// Arena / wheel
// ---------------------------------------------------------------------------

/// PvP game variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameType {
    /// Turbo heads-up poker.
    Poker,
    /// Dice duel.
    Dice,
    /// Rock-paper-scissors best of five.
    Rps,
}

/// Phase of the wheel-of-fate cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WheelPhase {
    /// No wheel event in progress.
    Idle,
    /// A duel has been announced; agents may queue.
    Announcing,
    /// Duels are being fought.
    Fighting,
    /// Rewards are being settled.
    Settling,
}

// ---------------------------------------------------------------------------
// Paid skills
// ---------------------------------------------------------------------------

/// The catalog of paid skills the oracle sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillKind {
    /// AMM depth and slippage report.
    MarketDepth,
    /// Index of profitable building blueprints.
    BlueprintIndex,
    /// Scouting report on other agents.
    ScoutReport,
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Which path produced a decision, for logs and decision records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPath {
    /// The language model chose the action.
    Llm,
    /// The deterministic degen-loop policy chose it.
    DegenLoop,
    /// A STRONG/OVERRIDE command forced it.
    Forced,
    /// A parse or pipeline failure fell back to rest.
    Fallback,
}

impl DecisionPath {
    /// Human-readable label for logging and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::DegenLoop => "degen_loop",
            Self::Forced => "forced",
            Self::Fallback => "fallback",
        }
    }
}

/// Operator nudge kinds accepted by the manual planner and the degen loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeKind {
    /// Steer toward claiming/starting/continuing a build.
    Build,
    /// Steer toward submitting work steps.
    Work,
    /// Steer toward a PvP match.
    Fight,
    /// Steer toward an AMM swap.
    Trade,
    /// Do nothing.
    Rest,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn action_type_wire_names_are_snake_case() {
        let json = serde_json::to_string(&ActionType::ClaimPlot).unwrap();
        assert_eq!(json, "\"claim_plot\"");
        assert_eq!(ActionType::BuyArena.as_str(), "buy_arena");
    }

    #[test]
    fn command_mode_wire_names_are_screaming() {
        let json = serde_json::to_string(&CommandMode::Override).unwrap();
        assert_eq!(json, "\"OVERRIDE\"");
        assert!(CommandMode::Override.is_forced());
        assert!(CommandMode::Strong.is_forced());
        assert!(!CommandMode::Suggest.is_forced());
    }

    #[test]
    fn private_event_kinds() {
        assert!(EventKind::X402Skill.is_private());
        assert!(EventKind::AgentChat.is_private());
        assert!(EventKind::RelationshipChange.is_private());
        assert!(EventKind::AgentTrade.is_private());
        assert!(!EventKind::BuildStarted.is_private());
    }

    #[test]
    fn zone_work_steps_match_catalog() {
        assert_eq!(Zone::Residential.min_work_steps(), 3);
        assert_eq!(Zone::Commercial.min_work_steps(), 4);
        assert_eq!(Zone::Civic.min_work_steps(), 5);
        assert_eq!(Zone::Industrial.min_work_steps(), 4);
        assert_eq!(Zone::Entertainment.min_work_steps(), 4);
    }

    #[test]
    fn reason_code_display_matches_wire() {
        assert_eq!(ReasonCode::InsufficientArena.to_string(), "INSUFFICIENT_ARENA");
        let json = serde_json::to_string(&ReasonCode::TargetUnavailable).unwrap();
        assert_eq!(json, "\"TARGET_UNAVAILABLE\"");
    }
}
