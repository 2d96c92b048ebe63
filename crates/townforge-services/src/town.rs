//! Town service contract: plots, builds, events, yield.
//!
//! The town/plot/zone CRUD and its invariants live in the host; the
//! engine drives them through this trait. The in-memory stub keeps a
//! plot board good enough for the engine's own tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use townforge_types::{
    AgentId, EventId, EventKind, PlotId, PlotStatus, PlotView, ReasonCode, TownEvent, TownId,
    TownStatus, TownView, WorldStats, Zone,
};

use crate::error::ServiceError;

/// Contract for the town collaborator.
#[async_trait]
pub trait TownService: Send + Sync {
    /// The currently active town, if any.
    async fn get_active_town(&self) -> Result<Option<TownView>, ServiceError>;

    /// All towns in `BUILDING` or `COMPLETE` status (world-event fan-out).
    async fn get_live_towns(&self) -> Result<Vec<TownView>, ServiceError>;

    /// Create a fresh town at the given level and make it active.
    async fn create_town(&self, name: &str, level: u32) -> Result<TownView, ServiceError>;

    /// Plots owned by the agent across the active town.
    async fn get_agent_plots(&self, agent_id: AgentId) -> Result<Vec<PlotView>, ServiceError>;

    /// Claimable plots in the town.
    async fn get_available_plots(&self, town_id: TownId) -> Result<Vec<PlotView>, ServiceError>;

    /// Most recent events for the town, newest first.
    async fn get_recent_events(
        &self,
        town_id: TownId,
        limit: usize,
    ) -> Result<Vec<TownEvent>, ServiceError>;

    /// Aggregate world statistics.
    async fn get_world_stats(&self) -> Result<WorldStats, ServiceError>;

    /// Claim an empty plot for the agent. The service debits the claim
    /// cost from the agent's bankroll inside its own transaction.
    async fn claim_plot(
        &self,
        agent_id: AgentId,
        town_id: TownId,
        index: u32,
    ) -> Result<PlotView, ServiceError>;

    /// Start a build on a claimed plot, debiting the build cost.
    async fn start_build(
        &self,
        agent_id: AgentId,
        plot_id: PlotId,
        building_type: &str,
        cost: i64,
    ) -> Result<PlotView, ServiceError>;

    /// Append one design work step to an under-construction plot.
    async fn submit_work(
        &self,
        agent_id: AgentId,
        plot_id: PlotId,
        log: &str,
    ) -> Result<PlotView, ServiceError>;

    /// Persist the building's extracted display name.
    async fn set_building_name(&self, plot_id: PlotId, name: &str) -> Result<(), ServiceError>;

    /// Complete a build that has accumulated enough work steps.
    async fn complete_build(
        &self,
        agent_id: AgentId,
        plot_id: PlotId,
    ) -> Result<PlotView, ServiceError>;

    /// Adjust the town yield contribution of a completed plot.
    async fn adjust_plot_yield(&self, plot_id: PlotId, delta: i32) -> Result<(), ServiceError>;

    /// Move $ARENA between two agents.
    async fn transfer_arena(
        &self,
        from: AgentId,
        to: AgentId,
        amount: i64,
    ) -> Result<(), ServiceError>;

    /// Distribute accumulated yield for a completed town.
    async fn distribute_yield(&self, town_id: TownId) -> Result<(), ServiceError>;

    /// Append an event to the town log.
    async fn log_event(
        &self,
        town_id: TownId,
        kind: EventKind,
        title: &str,
        description: &str,
        agent_id: Option<AgentId>,
        metadata: serde_json::Value,
    ) -> Result<EventId, ServiceError>;
}

// ---------------------------------------------------------------------------
// In-memory stub
// ---------------------------------------------------------------------------

/// Mutable state behind the stub's mutex.
#[derive(Debug, Default)]
struct StubTownState {
    towns: Vec<TownView>,
    plots: BTreeMap<PlotId, PlotView>,
    events: Vec<TownEvent>,
    yield_distributions: Vec<TownId>,
    transfers: Vec<(AgentId, AgentId, i64)>,
    tick: u64,
}

/// In-memory town service used by the engine's tests.
///
/// Not a faithful economy: claims and builds are free at this layer (the
/// stub does not hold agent balances), but statuses, ownership, and work
/// step counts behave like the real service.
#[derive(Debug, Default)]
pub struct StubTownService {
    state: Mutex<StubTownState>,
}

impl StubTownService {
    /// Create an empty stub with no towns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stub with one active `BUILDING` town and a plot board of
    /// `zones.len()` empty plots, returning the town id and plot ids.
    pub fn with_town(zones: &[Zone]) -> (Self, TownId, Vec<PlotId>) {
        let stub = Self::new();
        let town_id = TownId::new();
        let mut plot_ids = Vec::new();
        {
            #[allow(clippy::unwrap_used)]
            let mut state = stub.state.lock().unwrap();
            state.towns.push(TownView {
                id: town_id,
                name: String::from("Town 1"),
                level: 1,
                status: TownStatus::Building,
                plots_total: u32::try_from(zones.len()).unwrap_or(0),
                plots_claimed: 0,
            });
            for (i, zone) in zones.iter().enumerate() {
                let plot_id = PlotId::new();
                plot_ids.push(plot_id);
                state.plots.insert(
                    plot_id,
                    PlotView {
                        id: plot_id,
                        town_id,
                        index: u32::try_from(i).unwrap_or(0),
                        zone: *zone,
                        status: PlotStatus::Empty,
                        owner: None,
                        building_type: None,
                        building_name: None,
                        work_steps: 0,
                        build_cost: None,
                    },
                );
            }
        }
        (stub, town_id, plot_ids)
    }

    /// Advance the stub's internal tick used to stamp logged events.
    pub fn set_tick(&self, tick: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.tick = tick;
        }
    }

    /// Force a town's status (test setup).
    pub fn set_town_status(&self, town_id: TownId, status: TownStatus) {
        if let Ok(mut state) = self.state.lock()
            && let Some(town) = state.towns.iter_mut().find(|t| t.id == town_id)
        {
            town.status = status;
        }
    }

    /// Count of towns created so far (test assertion).
    pub fn town_count(&self) -> usize {
        self.state.lock().map(|s| s.towns.len()).unwrap_or(0)
    }

    /// Events logged so far (test assertion).
    pub fn events(&self) -> Vec<TownEvent> {
        self.state.lock().map(|s| s.events.clone()).unwrap_or_default()
    }

    /// Directly mutate a plot (test setup).
    pub fn patch_plot(&self, plot_id: PlotId, patch: impl FnOnce(&mut PlotView)) {
        if let Ok(mut state) = self.state.lock()
            && let Some(plot) = state.plots.get_mut(&plot_id)
        {
            patch(plot);
        }
    }

    /// Yield distributions recorded so far (test assertion).
    pub fn yield_distributions(&self) -> Vec<TownId> {
        self.state
            .lock()
            .map(|s| s.yield_distributions.clone())
            .unwrap_or_default()
    }

    /// Transfers recorded so far (test assertion).
    pub fn transfers(&self) -> Vec<(AgentId, AgentId, i64)> {
        self.state
            .lock()
            .map(|s| s.transfers.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StubTownState>, ServiceError> {
        self.state
            .lock()
            .map_err(|_| ServiceError::downstream("town stub poisoned"))
    }
}

#[async_trait]
impl TownService for StubTownService {
    async fn get_active_town(&self) -> Result<Option<TownView>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .towns
            .iter()
            .find(|t| matches!(t.status, TownStatus::Building))
            .cloned())
    }

    async fn get_live_towns(&self) -> Result<Vec<TownView>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .towns
            .iter()
            .filter(|t| matches!(t.status, TownStatus::Building | TownStatus::Complete))
            .cloned()
            .collect())
    }

    async fn create_town(&self, name: &str, level: u32) -> Result<TownView, ServiceError> {
        let mut state = self.lock()?;
        let town = TownView {
            id: TownId::new(),
            name: name.to_owned(),
            level,
            status: TownStatus::Building,
            plots_total: 0,
            plots_claimed: 0,
        };
        state.towns.push(town.clone());
        Ok(town)
    }

    async fn get_agent_plots(&self, agent_id: AgentId) -> Result<Vec<PlotView>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .plots
            .values()
            .filter(|p| p.owner == Some(agent_id))
            .cloned()
            .collect())
    }

    async fn get_available_plots(&self, town_id: TownId) -> Result<Vec<PlotView>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .plots
            .values()
            .filter(|p| p.town_id == town_id && matches!(p.status, PlotStatus::Empty))
            .cloned()
            .collect())
    }

    async fn get_recent_events(
        &self,
        town_id: TownId,
        limit: usize,
    ) -> Result<Vec<TownEvent>, ServiceError> {
        let state = self.lock()?;
        // Single-town stub: the town id is not used to partition events.
        let _ = town_id;
        let mut events = state.events.clone();
        events.reverse();
        events.truncate(limit);
        Ok(events)
    }

    async fn get_world_stats(&self) -> Result<WorldStats, ServiceError> {
        let state = self.lock()?;
        let completed = state
            .towns
            .iter()
            .filter(|t| matches!(t.status, TownStatus::Complete))
            .count();
        Ok(WorldStats {
            completed_towns: u32::try_from(completed).unwrap_or(u32::MAX),
            upkeep_multiplier: Decimal::ONE,
            cost_multiplier: Decimal::ONE,
        })
    }

    async fn claim_plot(
        &self,
        agent_id: AgentId,
        town_id: TownId,
        index: u32,
    ) -> Result<PlotView, ServiceError> {
        let mut state = self.lock()?;
        let plot = state
            .plots
            .values_mut()
            .find(|p| p.town_id == town_id && p.index == index)
            .ok_or_else(|| ServiceError::not_found(format!("plot {index}")))?;
        if !matches!(plot.status, PlotStatus::Empty) {
            return Err(ServiceError::Rejected {
                code: ReasonCode::TargetUnavailable,
                message: format!("plot {index} is not claimable"),
            });
        }
        plot.status = PlotStatus::Claimed;
        plot.owner = Some(agent_id);
        let claimed = plot.clone();
        if let Some(town) = state.towns.iter_mut().find(|t| t.id == town_id) {
            town.plots_claimed = town.plots_claimed.saturating_add(1);
        }
        Ok(claimed)
    }

    async fn start_build(
        &self,
        agent_id: AgentId,
        plot_id: PlotId,
        building_type: &str,
        cost: i64,
    ) -> Result<PlotView, ServiceError> {
        let mut state = self.lock()?;
        let plot = state
            .plots
            .get_mut(&plot_id)
            .ok_or_else(|| ServiceError::not_found("plot"))?;
        if plot.owner != Some(agent_id) {
            return Err(ServiceError::Rejected {
                code: ReasonCode::TargetUnavailable,
                message: String::from("plot is not owned by agent"),
            });
        }
        plot.status = PlotStatus::UnderConstruction;
        plot.building_type = Some(building_type.to_owned());
        plot.build_cost = Some(cost);
        Ok(plot.clone())
    }

    async fn submit_work(
        &self,
        agent_id: AgentId,
        plot_id: PlotId,
        log: &str,
    ) -> Result<PlotView, ServiceError> {
        let mut state = self.lock()?;
        let plot = state
            .plots
            .get_mut(&plot_id)
            .ok_or_else(|| ServiceError::not_found("plot"))?;
        if plot.owner != Some(agent_id) {
            return Err(ServiceError::Rejected {
                code: ReasonCode::TargetUnavailable,
                message: String::from("plot is not owned by agent"),
            });
        }
        let _ = log;
        plot.work_steps = plot.work_steps.saturating_add(1);
        Ok(plot.clone())
    }

    async fn set_building_name(&self, plot_id: PlotId, name: &str) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let plot = state
            .plots
            .get_mut(&plot_id)
            .ok_or_else(|| ServiceError::not_found("plot"))?;
        plot.building_name = Some(name.to_owned());
        Ok(())
    }

    async fn complete_build(
        &self,
        agent_id: AgentId,
        plot_id: PlotId,
    ) -> Result<PlotView, ServiceError> {
        let mut state = self.lock()?;
        let plot = state
            .plots
            .get_mut(&plot_id)
            .ok_or_else(|| ServiceError::not_found("plot"))?;
        if plot.owner != Some(agent_id) {
            return Err(ServiceError::Rejected {
                code: ReasonCode::TargetUnavailable,
                message: String::from("plot is not owned by agent"),
            });
        }
        if plot.work_steps < plot.zone.min_work_steps() {
            return Err(ServiceError::Rejected {
                code: ReasonCode::NotReady,
                message: String::from("not enough work steps"),
            });
        }
        plot.status = PlotStatus::Complete;
        Ok(plot.clone())
    }

    async fn adjust_plot_yield(&self, plot_id: PlotId, delta: i32) -> Result<(), ServiceError> {
        let state = self.lock()?;
        if state.plots.contains_key(&plot_id) {
            let _ = delta;
            Ok(())
        } else {
            Err(ServiceError::not_found("plot"))
        }
    }

    async fn transfer_arena(
        &self,
        from: AgentId,
        to: AgentId,
        amount: i64,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.transfers.push((from, to, amount));
        Ok(())
    }

    async fn distribute_yield(&self, town_id: TownId) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.yield_distributions.push(town_id);
        Ok(())
    }

    async fn log_event(
        &self,
        town_id: TownId,
        kind: EventKind,
        title: &str,
        description: &str,
        agent_id: Option<AgentId>,
        metadata: serde_json::Value,
    ) -> Result<EventId, ServiceError> {
        let mut state = self.lock()?;
        let _ = (town_id, metadata);
        let id = EventId::new();
        let tick = state.tick;
        state.events.push(TownEvent {
            id,
            kind,
            title: title.to_owned(),
            description: description.to_owned(),
            agent_id,
            tick,
        });
        Ok(id)
    }
}
