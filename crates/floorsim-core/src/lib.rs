//! floorsim core -- the shared vocabulary of the manufacturing-floor simulation.
//!
//! Everything here is independent of the grid and of the engine's process
//! scheduling: identifiers, fixed-point time math, the deterministic RNG,
//! production materials and orders, bounded material stores, the immutable
//! catalog [`registry::Registry`], the typed [`event::EventBus`] and the
//! external [`command::CommandQueue`].
//!
//! # Key Types
//!
//! - [`material::ProductionMaterial`] -- a product group at a given process
//!   step, with an item type that must agree with the step.
//! - [`order::Order`], [`order::ProcessingOrder`], [`order::ProcessMaterial`]
//!   -- customer orders and the per-machine work items derived from them.
//! - [`store::MaterialStore`] -- bounded list of material stacks.
//! - [`registry::Registry`] -- machine types, robot fleets, product routings
//!   and starting conditions, frozen before the first tick.
//! - [`status`] -- the state enums of the three entity state machines.

pub mod command;
pub mod error;
pub mod event;
pub mod fixed;
pub mod id;
pub mod material;
pub mod order;
pub mod registry;
pub mod rng;
pub mod status;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
