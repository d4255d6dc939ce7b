//! Simulation helpers shared by unit and integration tests.

use crate::engine::{Simulation, SimulationBuilder};
use floorsim_core::fixed::Ticks;
use floorsim_core::order::Order;
use floorsim_core::registry::RegistryBuilder;

/// Build a simulation with default engine settings.
pub fn build_sim(builder: RegistryBuilder, orders: impl IntoIterator<Item = Order>) -> Simulation {
    let registry = builder.build().expect("test catalog is valid");
    SimulationBuilder::new(registry)
        .orders(orders)
        .build()
        .expect("test floor builds")
}

/// Step until every order is delivered or `limit` is reached. Returns the
/// tick at which the run stopped.
pub fn run_until_done(sim: &mut Simulation, limit: Ticks) -> Ticks {
    while !sim.all_orders_complete() && sim.tick() < limit {
        sim.step().expect("step succeeds");
    }
    sim.tick()
}

/// Total units held by the Sink.
pub fn sink_total(sim: &Simulation) -> u32 {
    sim.sink_ids()
        .iter()
        .filter_map(|&id| sim.station(id))
        .map(|s| s.store.total())
        .sum()
}
