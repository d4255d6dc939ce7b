//! Cross-crate runs of small floors: load balancing, transport matching,
//! operator hand-off and determinism, driven through the public engine API.

use std::collections::BTreeSet;

use floorsim_core::id::{EntityId, EntityKind};
use floorsim_core::registry::{IntermediateStoreDef, RobotFleetDef};
use floorsim_core::status::{MachineState, TransportState};
use floorsim_core::test_utils::*;
use floorsim_engine::test_utils::{build_sim, run_until_done, sink_total};
use floorsim_engine::{ClockMode, EngineConfig, Simulation, SimulationBuilder};

// ============================================================================
// Helpers
// ============================================================================

fn units_of(sim: &Simulation, name: &str) -> u64 {
    let id = sim.entity_by_name(name).unwrap();
    sim.machine(id).unwrap().stats.units_produced
}

/// Drop-offs and pick-ups claimed by robots mid-delivery, excluding the
/// Source and Sink which accept any number of robots.
fn claimed_stations(sim: &Simulation) -> (Vec<EntityId>, Vec<EntityId>) {
    let exclusive = |id: EntityId| {
        !matches!(sim.kind_of(id), Some(EntityKind::Source) | Some(EntityKind::Sink))
    };
    let mut dropoffs = Vec::new();
    let mut pickups = Vec::new();
    for &tr in sim.transport_ids() {
        let robot = sim.transport(tr).unwrap();
        let Some(order) = &robot.order else { continue };
        match robot.state {
            TransportState::MovingToPickup => {
                if exclusive(order.pickup) {
                    pickups.push(order.pickup);
                }
                if exclusive(order.dropoff) {
                    dropoffs.push(order.dropoff);
                }
            }
            TransportState::Loading | TransportState::MovingToDropoff | TransportState::Unloading => {
                if exclusive(order.dropoff) {
                    dropoffs.push(order.dropoff);
                }
            }
            _ => {}
        }
    }
    (dropoffs, pickups)
}

/// `(pick-up, drop-off)` pairs robots are serving that no fresh request may
/// repeat. Once loaded the pick-up is free again, so a later request to
/// the Sink from the same machine is new work.
fn claimed_pairs(sim: &Simulation) -> Vec<(EntityId, EntityId)> {
    let mut pairs = Vec::new();
    for &tr in sim.transport_ids() {
        let robot = sim.transport(tr).unwrap();
        let Some(order) = &robot.order else { continue };
        let held = match robot.state {
            TransportState::MovingToPickup => true,
            TransportState::Loading | TransportState::MovingToDropoff | TransportState::Unloading => {
                sim.kind_of(order.dropoff) != Some(EntityKind::Sink)
            }
            _ => false,
        };
        if held {
            pairs.push((order.pickup, order.dropoff));
        }
    }
    pairs
}

fn all_distinct(ids: &[EntityId]) -> bool {
    ids.iter().collect::<BTreeSet<_>>().len() == ids.len()
}

// ============================================================================
// Load balancing
// ============================================================================

#[test]
fn orders_spread_over_machines_of_one_type() {
    let (mut builder, _, _) = two_step_builder();
    let mut def = machine_def("P", 5);
    def.count = 2;
    let p = builder.register_machine_type(def);
    let pair = builder.register_product("Pair", vec![step(p, 4)]);

    // Both orders are released on the same tick: the first lands on P-1 by
    // the tie rule, the second on the now shorter queue of P-2.
    let mut sim = build_sim(builder, [order(1, pair, 3), order(2, pair, 3)]);
    run_until_done(&mut sim, 4_000);
    assert!(sim.all_orders_complete());
    assert_eq!(units_of(&sim, "P-1"), 3);
    assert_eq!(units_of(&sim, "P-2"), 3);
    assert_eq!(sink_total(&sim), 6);
}

#[test]
fn old_machine_penalty_steers_work_to_the_new_one() {
    let (mut builder, _, _) = two_step_builder();
    let mut def = machine_def("C", 6);
    def.count = 2;
    def.old_count = 1;
    let c = builder.register_machine_type(def);
    let product = builder.register_product("Plate", vec![step(c, 10)]);

    // C-1 (new) and C-2 (old) each get four units; with the 20% penalty the
    // old machine's queue reads 48 against 40, so the last order goes to C-1.
    let mut sim = build_sim(
        builder,
        [order(1, product, 4), order(2, product, 4), order(3, product, 1)],
    );
    run_until_done(&mut sim, 4_000);
    assert!(sim.all_orders_complete());
    assert_eq!(units_of(&sim, "C-1"), 5);
    assert_eq!(units_of(&sim, "C-2"), 4);
}

// ============================================================================
// Transport matching
// ============================================================================

#[test]
fn a_station_is_never_claimed_twice() {
    let (mut builder, _, product) = two_step_builder();
    builder.set_transport_fleet(RobotFleetDef {
        count: 3,
        capacity: 2,
        ..RobotFleetDef::default()
    });
    builder.set_operator_fleet(RobotFleetDef {
        count: 2,
        capacity: 0,
        ..RobotFleetDef::default()
    });
    builder.set_intermediate_stores(IntermediateStoreDef {
        count: 1,
        ..IntermediateStoreDef::default()
    });
    let mut sim = build_sim(builder, [order(1, product, 6), order(2, product, 3)]);

    while !sim.all_orders_complete() && sim.tick() < 4_000 {
        sim.step().unwrap();
        let (dropoffs, pickups) = claimed_stations(&sim);
        assert!(all_distinct(&dropoffs), "drop-off claimed twice at tick {}", sim.tick());
        assert!(all_distinct(&pickups), "pick-up claimed twice at tick {}", sim.tick());
        for pair in claimed_pairs(&sim) {
            assert!(
                sim.pending_requests().iter().all(|r| (r.pickup, r.dropoff) != pair),
                "request {pair:?} pending while a robot serves it at tick {}",
                sim.tick()
            );
        }
        sim.grid().check_consistency().unwrap();
    }
    assert!(sim.all_orders_complete());
    assert_eq!(sink_total(&sim), 9);
}

#[test]
fn single_operator_alternates_between_two_steps() {
    // One operator and a batch larger than A's output: A pauses full while
    // B waits for staff, so the operator has to change machines mid-run.
    let (builder, _, product) = two_step_builder();
    let mut sim = build_sim(builder, [order(1, product, 12)]);
    run_until_done(&mut sim, 4_000);
    assert!(sim.all_orders_complete());
    assert_eq!(sink_total(&sim), 12);
    assert_eq!(units_of(&sim, "A-1"), 12);
    assert_eq!(units_of(&sim, "B-1"), 12);
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn several_products_share_the_floor() {
    let (mut builder, [_, b], gadget) = two_step_builder();
    let widget = builder.register_product("Widget", vec![step(b, 2)]);
    builder.set_operator_fleet(RobotFleetDef {
        count: 2,
        capacity: 0,
        ..RobotFleetDef::default()
    });
    let mut late = order(3, widget, 2);
    late.order_date = 120;
    let mut sim = build_sim(builder, [order(1, gadget, 3), order(2, widget, 2), late]);
    run_until_done(&mut sim, 4_000);

    assert!(sim.all_orders_complete());
    assert_eq!(sink_total(&sim), 7);
    assert_eq!(sim.completed_orders().len(), 3);
    for progress in sim.completed_orders() {
        assert!(progress.completed_at.unwrap() >= progress.released_at);
    }
    for &id in sim.machine_ids() {
        let m = sim.machine(id).unwrap();
        assert!(m.processing.is_empty());
        assert!(m.input.is_empty());
    }
}

#[test]
fn machines_settle_idle_after_the_last_order() {
    let (builder, _, product) = two_step_builder();
    let mut sim = build_sim(builder, [order(1, product, 2)]);
    let done = run_until_done(&mut sim, 4_000);
    sim.run_until(done + 300).unwrap();
    for &id in sim.machine_ids() {
        assert_eq!(sim.machine(id).unwrap().state, MachineState::Idle);
    }
    assert!(sim.pending_requests().is_empty());
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn identical_runs_hash_identically() {
    let run = || {
        let (builder, _, product) = two_step_builder();
        let mut sim = build_sim(builder, [order(1, product, 5), order(2, product, 2)]);
        let mut hashes = Vec::new();
        for _ in 0..400 {
            sim.step().unwrap();
            hashes.push(sim.state_hash());
        }
        hashes
    };
    assert_eq!(run(), run());
}

#[test]
fn event_driven_clock_reaches_the_same_outcome() {
    let outcome = |clock: ClockMode| {
        let (builder, _, product) = two_step_builder();
        let mut late = order(1, product, 3);
        late.order_date = 700;
        let mut sim = SimulationBuilder::new(builder.build().unwrap())
            .config(EngineConfig {
                clock,
                ..EngineConfig::default()
            })
            .orders([late])
            .build()
            .unwrap();
        run_until_done(&mut sim, 4_000);
        (sink_total(&sim), sim.completed_orders().len())
    };
    assert_eq!(outcome(ClockMode::Fixed), (3, 1));
    assert_eq!(outcome(ClockMode::EventDriven), (3, 1));
}
