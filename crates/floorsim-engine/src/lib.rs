//! floorsim engine -- the discrete-event driver of the manufacturing floor.
//!
//! [`Simulation`] owns the grid, the catalog and every entity. Machines,
//! transport robots and operator robots are processes: step functions
//! resumed by a min-heap [`scheduler::Scheduler`] in `(tick, sequence)`
//! order, so a run is fully deterministic for a given catalog, order list
//! and seed.
//!
//! Build one with [`SimulationBuilder`], drive it with
//! [`Simulation::step`] or [`Simulation::run_until`], and observe it
//! through the event bus or the [`query`] snapshots.

pub mod config;
pub mod engine;
pub mod error;
pub mod hash;
pub mod machine;
mod movement;
pub mod operator;
pub mod plan;
pub mod query;
pub mod scheduler;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ClockMode, EngineConfig};
pub use engine::{RunMode, Simulation, SimulationBuilder};
pub use error::{SetupError, SimError};
