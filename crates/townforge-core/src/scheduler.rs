//! The tick scheduler: the single cooperative driver loop.
//!
//! One tick at a time, guarded by an atomic re-entrancy flag -- a timer
//! that fires mid-tick is silently dropped, never queued. Each tick runs
//! the world-event pulse, the town bootstrap, the per-agent upkeep sweep
//! (oldest-active first), the 5-tick yield cadence, and then fans out
//! every active agent's pipeline in parallel.
//!
//! A single agent's failure never aborts the tick: pipelines reify their
//! own errors, and every scheduler-side collaborator call is logged and
//! skipped on failure.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};
use townforge_services::{AgentStore, TownService, WorldEvents};
use townforge_types::{AgentId, EventKind, HumanInstruction, LoopMode, TickResult, TownStatus};

use townforge_decision::DecisionEngine;

use crate::hooks;
use crate::pipeline::run_agent_pipeline;
use crate::services::Services;
use crate::state::EngineState;

/// Yield distribution runs every this many ticks.
const YIELD_CADENCE: u64 = 5;

/// Host callback receiving each agent's tick result.
///
/// Implementations must not block; failures are theirs to swallow.
pub trait TickCallback: Send + Sync {
    /// Called once per agent per tick, after the pipeline completes.
    fn on_tick_result(&self, result: &TickResult);
}

/// Summary of one executed tick.
#[derive(Debug, Clone)]
pub struct TickSummary {
    /// The tick number that ran.
    pub tick: u64,
    /// Per-agent results, in completion order.
    pub results: Vec<TickResult>,
}

/// The tick scheduler. Embedded as a library: the host constructs it,
/// calls [`start`](Self::start), and receives results through the
/// callback.
pub struct Scheduler {
    services: Services,
    engine: Arc<DecisionEngine>,
    state: Arc<EngineState>,
    current_tick: AtomicU64,
    tick_in_flight: AtomicBool,
    timer: Mutex<Option<tokio::task::JoinHandle<()>>>,
    callback: Mutex<Option<Arc<dyn TickCallback>>>,
}

impl Scheduler {
    /// Create a scheduler over the given collaborators.
    pub fn new(services: Services, engine: DecisionEngine) -> Self {
        Self {
            services,
            engine: Arc::new(engine),
            state: Arc::new(EngineState::new()),
            current_tick: AtomicU64::new(0),
            tick_in_flight: AtomicBool::new(false),
            timer: Mutex::new(None),
            callback: Mutex::new(None),
        }
    }

    /// Install the tick-result callback.
    pub fn set_on_tick_result(&self, callback: Arc<dyn TickCallback>) {
        if let Ok(mut slot) = self.callback.lock() {
            *slot = Some(callback);
        }
    }

    /// The process-scoped engine state (loop modes, instructions,
    /// cooldowns, rescue and streak ledgers).
    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    /// The current tick counter.
    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Acquire)
    }

    /// Set an agent's loop mode (in-memory; `Default` removes the entry).
    pub fn set_loop_mode(&self, agent_id: AgentId, mode: LoopMode) {
        self.state.set_loop_mode(agent_id, mode);
    }

    /// Read an agent's effective in-memory loop mode.
    pub fn loop_mode(&self, agent_id: AgentId) -> LoopMode {
        self.state.loop_mode(agent_id)
    }

    /// Queue a human instruction for the agent's next tick.
    pub fn queue_instruction(&self, agent_id: AgentId, instruction: HumanInstruction) {
        self.state.queue_instruction(agent_id, instruction);
    }

    /// Install the periodic timer. Ticks that fire while one is already
    /// running are dropped by the re-entrancy guard.
    pub fn start(self: &Arc<Self>, interval_ms: u64) {
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let _ = scheduler.tick().await;
            }
        });
        if let Ok(mut timer) = self.timer.lock() {
            if let Some(previous) = timer.replace(handle) {
                previous.abort();
            }
        }
        info!(interval_ms, "scheduler started");
    }

    /// Cancel the periodic timer.
    pub fn stop(&self) {
        if let Ok(mut timer) = self.timer.lock()
            && let Some(handle) = timer.take()
        {
            handle.abort();
            info!("scheduler stopped");
        }
    }

    /// Run one tick. Returns `None` when another tick is already in
    /// flight (the invocation is silently dropped).
    pub async fn tick(&self) -> Option<TickSummary> {
        if self.tick_in_flight.swap(true, Ordering::AcqRel) {
            debug!("tick already in flight, dropping this invocation");
            return None;
        }
        let summary = self.tick_inner().await;
        self.tick_in_flight.store(false, Ordering::Release);
        Some(summary)
    }

    /// Run one agent's pipeline at the current tick, outside the loop.
    pub async fn process_agent(&self, agent_id: AgentId) -> TickResult {
        let tick = self.current_tick();
        run_agent_pipeline(&self.services, &self.state, &self.engine, agent_id, tick).await
    }

    /// The tick body. Never fails; every collaborator error is logged
    /// and the tick moves on.
    async fn tick_inner(&self) -> TickSummary {
        let tick = self.current_tick.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        info!(tick, "tick started");

        self.pulse_world_events(tick).await;
        let town = self.ensure_active_town(tick).await;
        self.upkeep_sweep(tick, town.as_ref().map(|t| t.id)).await;

        if tick.checked_rem(YIELD_CADENCE) == Some(0) {
            self.distribute_yields(tick).await;
        }

        // Parallel per-agent fan-out.
        let agent_ids: Vec<AgentId> = match self.services.agents.list_active().await {
            Ok(agents) => agents.iter().map(|a| a.id).collect(),
            Err(err) => {
                warn!(tick, error = %err, "agent listing failed, empty tick");
                Vec::new()
            }
        };
        let pipelines = agent_ids.iter().map(|id| {
            run_agent_pipeline(&self.services, &self.state, &self.engine, *id, tick)
        });
        let results = join_all(pipelines).await;

        let callback = self.callback.lock().ok().and_then(|slot| slot.clone());
        if let Some(callback) = callback {
            for result in &results {
                callback.on_tick_result(result);
            }
        }

        info!(tick, agents = results.len(), "tick complete");
        TickSummary { tick, results }
    }

    /// Pulse the world-event generator; a new event is logged to every
    /// live town.
    async fn pulse_world_events(&self, tick: u64) {
        let event = match self.services.world_events.pulse(tick).await {
            Ok(event) => event,
            Err(err) => {
                warn!(tick, error = %err, "world-event pulse failed");
                None
            }
        };
        let Some(event) = event else { return };
        info!(tick, event = event.name, "world event started");

        let towns = self.services.towns.get_live_towns().await.unwrap_or_default();
        for town in towns {
            if let Err(err) = self
                .services
                .towns
                .log_event(
                    town.id,
                    EventKind::WorldEvent,
                    &event.name,
                    &event.description,
                    None,
                    serde_json::json!({ "expiresTick": event.expires_tick }),
                )
                .await
            {
                warn!(town_id = %town.id, error = %err, "world-event log failed");
            }
        }
    }

    /// Make sure an active town exists, creating "Town N" at level
    /// `completed + 1` when none does.
    async fn ensure_active_town(&self, tick: u64) -> Option<townforge_types::TownView> {
        match self.services.towns.get_active_town().await {
            Ok(Some(town)) => Some(town),
            Ok(None) => {
                let completed = self
                    .services
                    .towns
                    .get_world_stats()
                    .await
                    .map(|s| s.completed_towns)
                    .unwrap_or(0);
                let level = completed.saturating_add(1);
                let name = format!("Town {level}");
                match self.services.towns.create_town(&name, level).await {
                    Ok(town) => {
                        info!(tick, town = name, level, "created new town");
                        Some(town)
                    }
                    Err(err) => {
                        warn!(tick, error = %err, "town creation failed");
                        None
                    }
                }
            }
            Err(err) => {
                warn!(tick, error = %err, "active-town lookup failed");
                None
            }
        }
    }

    /// Per-agent economy sweep in oldest-active-first order: rescue,
    /// upkeep, rescue-debt repayment.
    async fn upkeep_sweep(&self, tick: u64, town_id: Option<townforge_types::TownId>) {
        let mut agents = match self.services.agents.list_active().await {
            Ok(agents) => agents,
            Err(err) => {
                warn!(tick, error = %err, "agent listing failed, skipping upkeep");
                return;
            }
        };
        // Round-robin fairness: agents idle longest go first (None sorts
        // before any timestamp).
        agents.sort_by_key(|a| a.last_active_at);

        let world_multiplier = self
            .services
            .towns
            .get_world_stats()
            .await
            .map(|s| s.upkeep_multiplier)
            .unwrap_or(rust_decimal::Decimal::ONE);

        for agent in agents {
            let agent_id = agent.id;
            if let Err(err) =
                hooks::maybe_rescue(&self.services, &self.state, &agent, tick, town_id).await
            {
                warn!(agent_id = %agent_id, tick, error = %err, "rescue hook failed");
            }
            // Re-read: a rescue may have just changed the balances.
            match self.services.agents.get(agent_id).await {
                Ok(fresh) => {
                    if let Err(err) =
                        hooks::apply_upkeep(&self.services, &fresh, tick, world_multiplier, town_id)
                            .await
                    {
                        warn!(agent_id = %agent_id, tick, error = %err, "upkeep hook failed");
                    }
                }
                Err(err) => {
                    warn!(agent_id = %agent_id, tick, error = %err, "upkeep re-read failed");
                }
            }
            if let Err(err) = hooks::apply_repayment(&self.services, &self.state, agent_id).await {
                warn!(agent_id = %agent_id, tick, error = %err, "repayment hook failed");
            }
        }
    }

    /// Distribute yield for every COMPLETE town.
    async fn distribute_yields(&self, tick: u64) {
        let towns = self.services.towns.get_live_towns().await.unwrap_or_default();
        for town in towns
            .into_iter()
            .filter(|t| matches!(t.status, TownStatus::Complete))
        {
            if let Err(err) = self.services.towns.distribute_yield(town.id).await {
                warn!(tick, town_id = %town.id, error = %err, "yield distribution failed");
            } else {
                debug!(tick, town_id = %town.id, "yield distributed");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testkit;
    use townforge_decision::PromptEngine;
    use townforge_types::{ActionType, Zone};

    fn scheduler_over(fixture: &testkit::Fixture) -> Arc<Scheduler> {
        let engine = DecisionEngine::new(
            Arc::clone(&fixture.gateway) as _,
            PromptEngine::embedded().unwrap(),
        );
        Arc::new(Scheduler::new(fixture.services.clone(), engine))
    }

    #[tokio::test]
    async fn first_tick_bootstraps_a_town() {
        let fixture = testkit::fixture();
        let scheduler = scheduler_over(&fixture);

        let summary = scheduler.tick().await.unwrap();
        assert_eq!(summary.tick, 1);
        assert_eq!(fixture.towns.town_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_ticks_drop_the_second() {
        use async_trait::async_trait;
        use townforge_services::{ServiceError, WorldEvents};
        use townforge_types::WorldEventView;

        /// A pulse that holds the tick open long enough to race it.
        struct SlowWorldEvents;

        #[async_trait]
        impl WorldEvents for SlowWorldEvents {
            async fn pulse(&self, _tick: u64) -> Result<Option<WorldEventView>, ServiceError> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(None)
            }

            async fn active_events(&self) -> Result<Vec<WorldEventView>, ServiceError> {
                Ok(Vec::new())
            }
        }

        let fixture = testkit::fixture();
        let mut services = fixture.services.clone();
        services.world_events = Arc::new(SlowWorldEvents);
        let engine = DecisionEngine::new(
            Arc::clone(&fixture.gateway) as _,
            PromptEngine::embedded().unwrap(),
        );
        let scheduler = Arc::new(Scheduler::new(services, engine));

        let background = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.tick().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The timer fired again mid-tick: silently dropped.
        assert!(scheduler.tick().await.is_none());

        let first = background.await.unwrap();
        assert!(first.is_some());

        // The guard releases once the in-flight tick completes.
        assert!(scheduler.tick().await.is_some());
    }

    #[tokio::test]
    async fn ticks_are_monotonic() {
        let fixture = testkit::fixture();
        let scheduler = scheduler_over(&fixture);
        for expected in 1..=4 {
            let summary = scheduler.tick().await.unwrap();
            assert_eq!(summary.tick, expected);
        }
    }

    #[tokio::test]
    async fn upkeep_is_deducted_each_tick() {
        let fixture = testkit::fixture();
        let agent = testkit::agent("Sable", 50, 0);
        let id = agent.id;
        fixture.seed_agent(&agent).await;
        let scheduler = scheduler_over(&fixture);
        // Degen loop keeps the pipeline off the (empty) model gateway.
        scheduler.set_loop_mode(id, townforge_types::LoopMode::DegenLoop);

        let _ = scheduler.tick().await.unwrap();
        assert_eq!(fixture.bankroll(id).await, 49);
    }

    #[tokio::test]
    async fn yield_distributes_every_fifth_tick() {
        let (fixture, town_id, _) = testkit::fixture_with_town(&[Zone::Residential]);
        fixture
            .towns
            .set_town_status(town_id, townforge_types::TownStatus::Complete);
        let scheduler = scheduler_over(&fixture);

        for _ in 0..4 {
            let _ = scheduler.tick().await.unwrap();
        }
        assert!(fixture.towns.yield_distributions().is_empty());

        let _ = scheduler.tick().await.unwrap();
        assert_eq!(fixture.towns.yield_distributions(), vec![town_id]);
    }

    #[tokio::test]
    async fn callback_sees_every_result() {
        use std::sync::atomic::AtomicUsize;

        struct Counter(AtomicUsize);
        impl TickCallback for Counter {
            fn on_tick_result(&self, _result: &TickResult) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let fixture = testkit::fixture();
        let a = testkit::agent("One", 50, 0);
        let b = testkit::agent("Two", 50, 0);
        fixture.seed_agent(&a).await;
        fixture.seed_agent(&b).await;
        let scheduler = scheduler_over(&fixture);
        scheduler.set_loop_mode(a.id, townforge_types::LoopMode::DegenLoop);
        scheduler.set_loop_mode(b.id, townforge_types::LoopMode::DegenLoop);

        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        scheduler.set_on_tick_result(Arc::clone(&counter) as _);

        let summary = scheduler.tick().await.unwrap();
        assert_eq!(summary.results.len(), 2);
        assert_eq!(counter.0.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn unknown_agent_reifies_into_failed_rest() {
        let fixture = testkit::fixture();
        let scheduler = scheduler_over(&fixture);

        let result = scheduler.process_agent(AgentId::new()).await;
        assert!(!result.success);
        assert_eq!(result.action.action_type, ActionType::Rest);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn world_event_pulse_logs_to_live_towns() {
        let (fixture, _, _) = testkit::fixture_with_town(&[Zone::Residential]);
        fixture.world_events.queue_pulse(townforge_types::WorldEventView {
            name: String::from("Harvest festival"),
            description: String::from("Yields are up all week"),
            expires_tick: 20,
        });
        let scheduler = scheduler_over(&fixture);

        let _ = scheduler.tick().await.unwrap();
        let events = fixture.towns.events();
        assert!(events
            .iter()
            .any(|e| e.kind == townforge_types::EventKind::WorldEvent
                && e.title == "Harvest festival"));
    }
}
