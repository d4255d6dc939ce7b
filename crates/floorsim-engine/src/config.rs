use floorsim_core::fixed::Ticks;
use serde::{Deserialize, Serialize};

/// How the clock advances between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClockMode {
    /// One tick per step.
    #[default]
    Fixed,
    /// One tick per step, then jump straight to the next tick at which a
    /// process or an order release is due.
    EventDriven,
}

/// Engine tunables. Catalog data lives in the registry; this is only how
/// the engine runs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub clock: ClockMode,
    /// Seed for backoff lengths.
    pub seed: u64,
    /// Ticks a blocked robot waits before replanning, drawn from this range.
    pub backoff_min: u32,
    pub backoff_max: u32,
    /// Consecutive blocked ticks before a stuck diagnostic is raised.
    pub stuck_threshold: Ticks,
    /// Ticks a paused machine keeps its operator before handing it to a
    /// machine that is waiting for one.
    pub operator_release_after: Ticks,
    /// Consecutive misses before a missing material is surfaced.
    pub material_retry_limit: u32,
    /// Ring capacity per event kind.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clock: ClockMode::Fixed,
            seed: 0x5EED,
            backoff_min: 1,
            backoff_max: 4,
            stuck_threshold: 200,
            operator_release_after: 20,
            material_retry_limit: 50,
            event_capacity: 1024,
        }
    }
}
