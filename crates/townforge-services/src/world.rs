//! World events, wheel-of-fate, and building-visual contracts.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use townforge_types::{PlotId, WheelPhase, WheelWindow, WorldEventView};

use crate::error::ServiceError;

/// Contract for the world-event collaborator.
#[async_trait]
pub trait WorldEvents: Send + Sync {
    /// Advance the event generator one tick. Returns a newly started
    /// event if the pulse produced one.
    async fn pulse(&self, tick: u64) -> Result<Option<WorldEventView>, ServiceError>;

    /// Events currently in effect.
    async fn active_events(&self) -> Result<Vec<WorldEventView>, ServiceError>;
}

/// Contract for the wheel-of-fate collaborator.
#[async_trait]
pub trait WheelOfFate: Send + Sync {
    /// Snapshot of the current wheel cycle.
    async fn window(&self) -> Result<WheelWindow, ServiceError>;
}

/// A selected building visual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingVisual {
    /// Sprite asset key.
    pub sprite: String,
    /// Emoji shorthand.
    pub emoji: String,
}

/// Contract for the building-visual collaborator.
///
/// Visual selection is best-effort: the dispatcher logs failures and
/// never fails a completed build over them.
#[async_trait]
pub trait BuildingVisuals: Send + Sync {
    /// Pick a sprite and emoji for a completed building.
    async fn select_visual(
        &self,
        plot_id: PlotId,
        building_type: &str,
        description: &str,
    ) -> Result<BuildingVisual, ServiceError>;
}

// ---------------------------------------------------------------------------
// In-memory stubs
// ---------------------------------------------------------------------------

/// World-event stub replaying a queue of scripted pulses.
#[derive(Debug, Default)]
pub struct StubWorldEvents {
    pulses: Mutex<VecDeque<WorldEventView>>,
    active: Mutex<Vec<WorldEventView>>,
}

impl StubWorldEvents {
    /// Create a stub with no scripted pulses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event to be returned by the next pulse.
    pub fn queue_pulse(&self, event: WorldEventView) {
        if let Ok(mut pulses) = self.pulses.lock() {
            pulses.push_back(event);
        }
    }
}

#[async_trait]
impl WorldEvents for StubWorldEvents {
    async fn pulse(&self, tick: u64) -> Result<Option<WorldEventView>, ServiceError> {
        let _ = tick;
        let popped = self
            .pulses
            .lock()
            .ok()
            .and_then(|mut p| p.pop_front());
        if let Some(event) = popped.clone()
            && let Ok(mut active) = self.active.lock()
        {
            active.push(event);
        }
        Ok(popped)
    }

    async fn active_events(&self) -> Result<Vec<WorldEventView>, ServiceError> {
        Ok(self.active.lock().map(|a| a.clone()).unwrap_or_default())
    }
}

/// Wheel stub with a settable window.
#[derive(Debug)]
pub struct StubWheel {
    window: Mutex<WheelWindow>,
}

impl Default for StubWheel {
    fn default() -> Self {
        Self::new()
    }
}

impl StubWheel {
    /// Create an idle wheel.
    pub fn new() -> Self {
        Self {
            window: Mutex::new(WheelWindow {
                phase: WheelPhase::Idle,
                game_type: None,
                wager: None,
                buffs: Vec::new(),
                queued_agents: Vec::new(),
            }),
        }
    }

    /// Replace the window snapshot.
    pub fn set_window(&self, window: WheelWindow) {
        if let Ok(mut current) = self.window.lock() {
            *current = window;
        }
    }
}

#[async_trait]
impl WheelOfFate for StubWheel {
    async fn window(&self) -> Result<WheelWindow, ServiceError> {
        self.window
            .lock()
            .map(|w| w.clone())
            .map_err(|_| ServiceError::downstream("wheel stub poisoned"))
    }
}

/// Visual stub that deterministically derives a sprite from the
/// building type.
#[derive(Debug, Default)]
pub struct StubVisuals {
    fail: Mutex<bool>,
}

impl StubVisuals {
    /// Create a stub that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent selection fail (best-effort path test).
    pub fn fail_always(&self) {
        if let Ok(mut flag) = self.fail.lock() {
            *flag = true;
        }
    }
}

#[async_trait]
impl BuildingVisuals for StubVisuals {
    async fn select_visual(
        &self,
        plot_id: PlotId,
        building_type: &str,
        description: &str,
    ) -> Result<BuildingVisual, ServiceError> {
        let _ = (plot_id, description);
        if self.fail.lock().map(|f| *f).unwrap_or(false) {
            return Err(ServiceError::downstream("visual selection unavailable"));
        }
        Ok(BuildingVisual {
            sprite: format!("sprite/{}", building_type.replace(' ', "_")),
            emoji: String::from("\u{1f3db}"),
        })
    }
}
