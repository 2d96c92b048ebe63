//! Observation payload assembled for an agent at the start of its tick.
//!
//! The observation is the **only** world state a decision path may read.
//! It is an immutable snapshot: nothing in it changes while the agent's
//! pipeline runs, and no pipeline sees another pipeline's mid-tick writes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{
    ActionType, Archetype, EventKind, GameType, PlotStatus, SkillKind, TownStatus, WheelPhase,
    Zone,
};
use crate::ids::{AgentId, EventId, PlotId, TownId};

/// The active town as seen by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownView {
    /// Town identifier.
    pub id: TownId,
    /// Display name (e.g. "Town 3").
    pub name: String,
    /// Town level; scales claim and build costs.
    pub level: u32,
    /// Lifecycle status.
    pub status: TownStatus,
    /// Total plot count.
    pub plots_total: u32,
    /// Number of plots already claimed.
    pub plots_claimed: u32,
}

/// One plot as seen by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotView {
    /// Plot identifier.
    pub id: PlotId,
    /// Owning town.
    pub town_id: TownId,
    /// Index within the town grid.
    pub index: u32,
    /// Zone classification.
    pub zone: Zone,
    /// Lifecycle status.
    pub status: PlotStatus,
    /// Owner, if claimed.
    pub owner: Option<AgentId>,
    /// The building concept, once a build has started.
    pub building_type: Option<String>,
    /// The building's chosen display name, once extracted.
    pub building_name: Option<String>,
    /// Work steps submitted so far.
    pub work_steps: u32,
    /// The build cost charged at `start_build`, if started.
    pub build_cost: Option<i64>,
}

impl PlotView {
    /// Whether this plot is under construction.
    pub const fn is_under_construction(&self) -> bool {
        matches!(self.status, PlotStatus::UnderConstruction)
    }

    /// Whether this plot has enough work steps to complete.
    pub const fn is_ready_to_complete(&self) -> bool {
        self.is_under_construction() && self.work_steps >= self.zone.min_work_steps()
    }
}

/// The agent's own state as presented in the observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfView {
    /// The agent's identifier.
    pub id: AgentId,
    /// The agent's name.
    pub name: String,
    /// Personality tag.
    pub archetype: Archetype,
    /// $ARENA balance.
    pub bankroll: i64,
    /// Stable reserve balance.
    pub reserve_balance: i64,
    /// Health in `0..=100`.
    pub health: i32,
    /// PvP rating.
    pub elo: i32,
    /// Whether the agent is inside a match right now.
    pub is_in_match: bool,
    /// Recent journal entries (newest last).
    pub scratchpad: Vec<String>,
    /// Last executed action type.
    pub last_action_type: Option<ActionType>,
    /// Ticks since the agent last traded on the AMM, if ever.
    pub ticks_since_last_trade: Option<u64>,
}

/// AMM pool summary at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSummary {
    /// Spot price of 1 $ARENA in reserve units.
    pub spot_price: Decimal,
    /// Swap fee in basis points.
    pub fee_bps: u32,
    /// Pool reserve-side balance.
    pub reserve_balance: i64,
    /// Pool $ARENA-side balance.
    pub arena_balance: i64,
}

/// A logged town event, already filtered for privacy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownEvent {
    /// Event identifier.
    pub id: EventId,
    /// Event kind.
    pub kind: EventKind,
    /// Short headline.
    pub title: String,
    /// Narrative body.
    pub description: String,
    /// The agent involved, if any.
    pub agent_id: Option<AgentId>,
    /// The tick the event was logged at.
    pub tick: u64,
}

/// A paid-skill output previously purchased by this agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillOutput {
    /// Which skill produced it.
    pub skill: SkillKind,
    /// The oracle's public summary.
    pub public_summary: String,
    /// The tick it was purchased at.
    pub tick: u64,
}

/// Another agent's public fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerView {
    /// The peer's identifier.
    pub id: AgentId,
    /// The peer's name.
    pub name: String,
    /// The peer's archetype.
    pub archetype: Archetype,
    /// The peer's $ARENA balance.
    pub bankroll: i64,
    /// The peer's rating.
    pub elo: i32,
    /// The peer's health.
    pub health: i32,
    /// Whether the peer is inside a match.
    pub is_in_match: bool,
    /// The peer's last executed action type.
    pub last_action_type: Option<ActionType>,
}

/// Relationship classification toward another agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Positive standing.
    Friend,
    /// Negative standing; rivals attract the PvP targeting bonus.
    Rival,
}

/// A scored relationship edge from the social graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipView {
    /// The other agent.
    pub agent_id: AgentId,
    /// The other agent's name.
    pub name: String,
    /// Friend or rival.
    pub kind: RelationKind,
    /// Signed intensity score.
    pub score: i32,
}

/// Aggregate world statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldStats {
    /// Towns completed so far.
    pub completed_towns: u32,
    /// Multiplier applied to per-tick upkeep.
    pub upkeep_multiplier: Decimal,
    /// Multiplier applied to build costs.
    pub cost_multiplier: Decimal,
}

/// Snapshot of the wheel-of-fate cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelWindow {
    /// Current phase.
    pub phase: WheelPhase,
    /// The announced game type, when a duel window is open.
    pub game_type: Option<GameType>,
    /// The announced wager.
    pub wager: Option<i64>,
    /// Active buffs granted by the wheel, as display strings.
    pub buffs: Vec<String>,
    /// Agents already queued for the duel.
    pub queued_agents: Vec<AgentId>,
}

impl WheelWindow {
    /// Whether the wheel currently invites a fight (announcing or fighting).
    pub const fn is_fight_window(&self) -> bool {
        matches!(self.phase, WheelPhase::Announcing | WheelPhase::Fighting)
    }

    /// Whether the given agent is already queued for the duel.
    pub fn is_queued(&self, agent_id: AgentId) -> bool {
        self.queued_agents.contains(&agent_id)
    }
}

/// Goal classification from the goal tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    /// First-to-finish race against other agents.
    Race,
    /// Cooperative pact with a deadline.
    Pact,
    /// Self-assigned objective.
    Personal,
}

/// A live objective from the goal tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalView {
    /// Narrative description.
    pub description: String,
    /// Race, pact, or personal.
    pub kind: GoalKind,
    /// Plot index the goal targets, if it is plot-bound.
    pub target_plot_index: Option<u32>,
    /// Deadline tick, if any.
    pub deadline_tick: Option<u64>,
}

/// An active world event as shown to agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldEventView {
    /// Event name.
    pub name: String,
    /// Narrative description.
    pub description: String,
    /// Tick at which the event expires.
    pub expires_tick: u64,
}

/// The complete observation assembled for one agent at one tick.
///
/// When no active town exists, [`Observation::degenerate`] produces a
/// snapshot with `town: None` and empty collections; the pipeline still
/// runs, and every execution branch reports "no active town".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// The tick this snapshot belongs to.
    pub tick: u64,
    /// The active town, if one exists.
    pub town: Option<TownView>,
    /// Plots owned by this agent.
    pub my_plots: Vec<PlotView>,
    /// Plots currently claimable.
    pub available_plots: Vec<PlotView>,
    /// The agent's own state.
    pub self_view: SelfView,
    /// AMM pool summary.
    pub pool: PoolSummary,
    /// Recent town events with private kinds stripped.
    pub recent_events: Vec<TownEvent>,
    /// The agent's recent paid-skill outputs.
    pub skill_outputs: Vec<SkillOutput>,
    /// Other agents' public fields.
    pub other_agents: Vec<PeerView>,
    /// Scored relationships from the social graph.
    pub relationships: Vec<RelationshipView>,
    /// Aggregate world statistics.
    pub world: WorldStats,
    /// Wheel-of-fate snapshot.
    pub wheel: WheelWindow,
    /// Live objectives for this agent.
    pub goals: Vec<GoalView>,
    /// Active world events.
    pub world_events: Vec<WorldEventView>,
}

impl Observation {
    /// Build the no-active-town snapshot.
    pub fn degenerate(tick: u64, self_view: SelfView, pool: PoolSummary) -> Self {
        Self {
            tick,
            town: None,
            my_plots: Vec::new(),
            available_plots: Vec::new(),
            self_view,
            pool,
            recent_events: Vec::new(),
            skill_outputs: Vec::new(),
            other_agents: Vec::new(),
            relationships: Vec::new(),
            world: WorldStats {
                completed_towns: 0,
                upkeep_multiplier: Decimal::ONE,
                cost_multiplier: Decimal::ONE,
            },
            wheel: WheelWindow {
                phase: WheelPhase::Idle,
                game_type: None,
                wager: None,
                buffs: Vec::new(),
                queued_agents: Vec::new(),
            },
            goals: Vec::new(),
            world_events: Vec::new(),
        }
    }

    /// The agent's plots currently under construction, highest
    /// work-step count first.
    pub fn under_construction(&self) -> Vec<&PlotView> {
        let mut plots: Vec<&PlotView> = self
            .my_plots
            .iter()
            .filter(|p| p.is_under_construction())
            .collect();
        plots.sort_by(|a, b| b.work_steps.cmp(&a.work_steps));
        plots
    }

    /// The agent's plots that are claimed but not yet started.
    pub fn claimed_idle(&self) -> Vec<&PlotView> {
        self.my_plots
            .iter()
            .filter(|p| matches!(p.status, PlotStatus::Claimed))
            .collect()
    }

    /// The first under-construction plot with enough work steps to
    /// complete, if any.
    pub fn ready_to_complete(&self) -> Option<&PlotView> {
        self.my_plots.iter().find(|p| p.is_ready_to_complete())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn self_view() -> SelfView {
        SelfView {
            id: AgentId::new(),
            name: String::from("Mags"),
            archetype: Archetype::Grinder,
            bankroll: 100,
            reserve_balance: 50,
            health: 100,
            elo: 1200,
            is_in_match: false,
            scratchpad: Vec::new(),
            last_action_type: None,
            ticks_since_last_trade: None,
        }
    }

    fn pool() -> PoolSummary {
        PoolSummary {
            spot_price: Decimal::ONE,
            fee_bps: 100,
            reserve_balance: 10_000,
            arena_balance: 10_000,
        }
    }

    fn plot(index: u32, zone: Zone, status: PlotStatus, work_steps: u32) -> PlotView {
        PlotView {
            id: PlotId::new(),
            town_id: TownId::new(),
            index,
            zone,
            status,
            owner: None,
            building_type: None,
            building_name: None,
            work_steps,
            build_cost: None,
        }
    }

    #[test]
    fn degenerate_observation_has_no_town() {
        let obs = Observation::degenerate(7, self_view(), pool());
        assert!(obs.town.is_none());
        assert!(obs.my_plots.is_empty());
        assert_eq!(obs.tick, 7);
    }

    #[test]
    fn under_construction_sorted_by_work_steps() {
        let mut obs = Observation::degenerate(1, self_view(), pool());
        obs.my_plots = vec![
            plot(0, Zone::Residential, PlotStatus::UnderConstruction, 1),
            plot(1, Zone::Civic, PlotStatus::UnderConstruction, 4),
            plot(2, Zone::Commercial, PlotStatus::Claimed, 0),
        ];
        let uc = obs.under_construction();
        assert_eq!(uc.len(), 2);
        assert_eq!(uc.first().map(|p| p.index), Some(1));
    }

    #[test]
    fn ready_to_complete_respects_zone_minimums() {
        let mut obs = Observation::degenerate(1, self_view(), pool());
        obs.my_plots = vec![
            plot(0, Zone::Civic, PlotStatus::UnderConstruction, 4),
            plot(1, Zone::Residential, PlotStatus::UnderConstruction, 3),
        ];
        // Civic needs 5 steps; residential needs 3.
        assert_eq!(obs.ready_to_complete().map(|p| p.index), Some(1));
    }

    #[test]
    fn wheel_fight_window() {
        let mut wheel = WheelWindow {
            phase: WheelPhase::Idle,
            game_type: None,
            wager: None,
            buffs: Vec::new(),
            queued_agents: Vec::new(),
        };
        assert!(!wheel.is_fight_window());
        wheel.phase = WheelPhase::Announcing;
        assert!(wheel.is_fight_window());
    }
}
