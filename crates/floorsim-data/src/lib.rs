//! Scenario files for the floor simulation.
//!
//! A scenario directory holds `catalog`, `orders` and optionally `layout`
//! and `engine` files, each in RON, TOML or JSON. [`load_scenario`] reads
//! them, resolves names to ids and returns the typed inputs of a
//! [`floorsim_engine::SimulationBuilder`].

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, Scenario, load_scenario};
