//! The simulation: entity storage, the per-tick pipeline and the builder.
//!
//! # Tick pipeline
//!
//! Each call to [`Simulation::step`] runs, in order:
//!
//! 1. **Commands** -- external and reactive commands queued since the last
//!    tick are applied.
//! 2. **Order release** -- orders whose date has come are queued as step 1
//!    on the least-loaded machine of the right type.
//! 3. **Dispatch** -- transport requests are rebuilt and matched to robots,
//!    then operators are sent to machines that need one.
//! 4. **Processes** -- every machine, transport and operator process due
//!    this tick runs once, in resume order.
//! 5. **Event delivery** -- buffered events go to listeners.
//! 6. **Bookkeeping** -- utilization counters, clock advance, state hash.

use crate::config::{ClockMode, EngineConfig};
use crate::error::{SetupError, SimError};
use crate::hash::StateHash;
use crate::machine::{Machine, MachineQuality};
use crate::movement::NavParams;
use crate::operator::OperatorRobot;
use crate::scheduler::{Scheduler, StepOutcome};
use crate::transport::{TransportRequest, TransportRobot};
use floorsim_core::command::{CommandQueue, SimCommand};
use floorsim_core::event::{Event, EventBus, EventKind, PassiveListener, ReactiveHandler};
use floorsim_core::fixed::Ticks;
use floorsim_core::id::{EntityId, EntityKind};
use floorsim_core::material::ProductionMaterial;
use floorsim_core::order::{Order, ProcessMaterial};
use floorsim_core::registry::{Registry, Size};
use floorsim_core::rng::SimRng;
use floorsim_core::store::MaterialStore;
use floorsim_spatial::{Assignment, FloorGrid, LayoutEntry, LayoutError, LayoutReport, apply_layout};
use log::{info, warn};
use serde::Serialize;
use slotmap::{Key, SecondaryMap, SlotMap};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RunMode {
    #[default]
    Running,
    /// Machines start no new units.
    ProductionStopped,
    /// Every process holds.
    Stopped,
}

/// Which side of a station a transport flag guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Input,
    Output,
}

#[derive(Debug, Clone)]
pub struct EntityInfo {
    pub kind: EntityKind,
    pub name: String,
}

/// Source, Sink or intermediate store.
#[derive(Debug, Clone)]
pub struct Station {
    pub kind: EntityKind,
    pub store: MaterialStore,
    pub awaiting_input: bool,
    pub awaiting_pickup: bool,
}

impl Station {
    fn new(kind: EntityKind, store: MaterialStore) -> Self {
        Self {
            kind,
            store,
            awaiting_input: false,
            awaiting_pickup: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderProgress {
    pub order: Order,
    pub released_at: Ticks,
    /// Packed units credited to this order at the Sink.
    pub delivered: u32,
    pub completed_at: Option<Ticks>,
}

/// Units that crossed the production boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlowCounters {
    pub released: u64,
    pub delivered: u64,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

pub struct Simulation {
    pub(crate) tick: Ticks,
    pub(crate) config: EngineConfig,
    pub(crate) registry: Registry,
    pub(crate) grid: FloorGrid,

    pub(crate) entities: SlotMap<EntityId, EntityInfo>,
    // Fixed iteration order per kind.
    pub(crate) machine_ids: Vec<EntityId>,
    pub(crate) transport_ids: Vec<EntityId>,
    pub(crate) operator_ids: Vec<EntityId>,
    pub(crate) source_ids: Vec<EntityId>,
    pub(crate) sink_ids: Vec<EntityId>,
    pub(crate) store_ids: Vec<EntityId>,

    pub(crate) machines: SecondaryMap<EntityId, Machine>,
    pub(crate) transports: SecondaryMap<EntityId, TransportRobot>,
    pub(crate) operators: SecondaryMap<EntityId, OperatorRobot>,
    pub(crate) stations: SecondaryMap<EntityId, Station>,

    /// Orders not yet released, by order date.
    pub(crate) backlog: VecDeque<Order>,
    pub(crate) active_orders: Vec<OrderProgress>,
    pub(crate) completed_orders: Vec<OrderProgress>,
    pub(crate) pending_requests: Vec<TransportRequest>,
    pub(crate) flow: FlowCounters,

    pub(crate) scheduler: Scheduler,
    pub(crate) rng: SimRng,
    pub(crate) event_bus: EventBus,
    pub(crate) commands: CommandQueue,
    pub(crate) run_mode: RunMode,
    layout: LayoutReport,
    /// Whether anything ran this tick; an idle tick lets the event-driven
    /// clock jump.
    activity: bool,
    last_state_hash: u64,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("entities", &self.entities.len())
            .field("run_mode", &self.run_mode)
            .field("active_orders", &self.active_orders.len())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    // -----------------------------------------------------------------------
    // Tick pipeline
    // -----------------------------------------------------------------------

    /// Advance the simulation by one step. An event-driven clock never
    /// jumps past the catalog's run duration.
    pub fn step(&mut self) -> Result<(), SimError> {
        let horizon = self.registry.starting_conditions().duration;
        self.step_bounded(horizon)
    }

    /// Step until the clock reaches `end`.
    pub fn run_until(&mut self, end: Ticks) -> Result<(), SimError> {
        while self.tick < end {
            self.step_bounded(end)?;
        }
        Ok(())
    }

    /// Run for the catalog's configured duration.
    pub fn run(&mut self) -> Result<(), SimError> {
        let end = self.registry.starting_conditions().duration;
        self.run_until(end)
    }

    fn step_bounded(&mut self, horizon: Ticks) -> Result<(), SimError> {
        self.activity = false;
        self.phase_commands();
        self.phase_release_orders()?;
        if self.run_mode != RunMode::Stopped {
            self.phase_dispatch();
        }
        self.phase_processes()?;
        self.phase_post_tick();
        self.phase_bookkeeping(horizon);
        Ok(())
    }

    fn phase_commands(&mut self) {
        let reactive = self.event_bus.drain_commands();
        self.commands.extend(reactive);
        for command in self.commands.drain(self.tick) {
            let mode = match command {
                SimCommand::Stop => RunMode::Stopped,
                SimCommand::StopProduction if self.run_mode == RunMode::Stopped => RunMode::Stopped,
                SimCommand::StopProduction => RunMode::ProductionStopped,
                SimCommand::Resume => RunMode::Running,
            };
            if mode != self.run_mode {
                info!("{command:?} at tick {}: {:?} -> {mode:?}", self.tick, self.run_mode);
                self.run_mode = mode;
                self.activity = true;
            }
        }
    }

    fn phase_release_orders(&mut self) -> Result<(), SimError> {
        let now = self.tick;
        while let Some(next) = self.backlog.front()
            && next.order_date <= now
        {
            let Some(order) = self.backlog.pop_front() else {
                break;
            };
            self.activity = true;
            if order.quantity == 0 {
                warn!("order {} has no units; skipped", order.id);
                continue;
            }
            let raw = self.registry.raw_material(order.product)?;
            let work = ProcessMaterial::new(raw, order.quantity)?;
            let machine = self.enqueue_step(order.processing_order(1), work, now)?;
            info!(
                "order {} released at {now}: {} x{} starts on {}",
                order.id,
                self.registry.product(order.product)?.name,
                order.quantity,
                self.name_of(machine)
            );
            self.event_bus.emit(Event::OrderReleased {
                order: order.id,
                tick: now,
            });
            self.active_orders.push(OrderProgress {
                order,
                released_at: now,
                delivered: 0,
                completed_at: None,
            });
        }
        Ok(())
    }

    fn phase_dispatch(&mut self) {
        let requests = self.generate_transport_requests();
        self.match_transport_requests(requests);
        self.dispatch_operators();
    }

    fn phase_processes(&mut self) -> Result<(), SimError> {
        let now = self.tick;
        while let Some(id) = self.scheduler.pop_due(now) {
            self.activity = true;
            let outcome = match self.kind_of(id) {
                Some(EntityKind::Machine) => self.step_machine(id)?,
                Some(EntityKind::TransportRobot) => self.step_transport(id)?,
                Some(EntityKind::WorkingRobot) => self.step_operator(id)?,
                _ => StepOutcome::Done,
            };
            self.scheduler.apply(id, outcome, now);
        }
        Ok(())
    }

    fn phase_post_tick(&mut self) {
        self.event_bus.deliver();
    }

    fn phase_bookkeeping(&mut self, horizon: Ticks) {
        let next = self.next_tick(horizon);
        let elapsed = next - self.tick;
        for m in self.machines.values_mut() {
            m.stats.ticks_in_state[m.state.index()] += elapsed;
        }
        self.tick = next;
        self.last_state_hash = self.compute_state_hash();
    }

    /// One tick ahead, or in event-driven mode after a tick where nothing
    /// happened, straight to the next due process or order release.
    fn next_tick(&mut self, horizon: Ticks) -> Ticks {
        let next = self.tick + 1;
        if self.config.clock == ClockMode::Fixed || self.activity {
            return next;
        }
        let due = self.scheduler.next_due();
        let release = self.backlog.front().map(|o| o.order_date);
        match due.into_iter().chain(release).min() {
            Some(t) => t.clamp(next, horizon.max(next)),
            None => horizon.max(next),
        }
    }

    fn compute_state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.tick);
        for (entity, fp) in self.grid.placed() {
            h.write_u64(entity.data().as_ffi());
            h.write_i32(fp.anchor.x);
            h.write_i32(fp.anchor.y);
        }
        for &id in &self.machine_ids {
            let Some(m) = self.machines.get(id) else {
                continue;
            };
            h.write_u8(m.state.index() as u8);
            hash_store(&mut h, &m.input);
            hash_store(&mut h, &m.output);
            for pm in &m.materials {
                h.write_u32(pm.qty_required);
                h.write_u32(pm.qty_producing);
            }
            h.write_u64(m.stats.units_produced);
        }
        for &id in &self.transport_ids {
            if let Some(t) = self.transports.get(id) {
                h.write_u8(t.state as u8);
                hash_store(&mut h, &t.cargo);
            }
        }
        for &id in &self.operator_ids {
            if let Some(w) = self.operators.get(id) {
                h.write_u8(w.state as u8);
            }
        }
        for id in self.source_ids.iter().chain(&self.sink_ids).chain(&self.store_ids) {
            if let Some(s) = self.stations.get(*id) {
                hash_store(&mut h, &s.store);
            }
        }
        h.write_u64(self.rng.state());
        h.finish()
    }

    // -----------------------------------------------------------------------
    // Shared helpers for the subsystems
    // -----------------------------------------------------------------------

    pub(crate) fn nav_params(&self) -> NavParams {
        NavParams {
            backoff_min: self.config.backoff_min,
            backoff_max: self.config.backoff_max,
            stuck_threshold: self.config.stuck_threshold,
        }
    }

    pub(crate) fn is_awaiting(&self, id: EntityId, side: Side) -> bool {
        if let Some(m) = self.machines.get(id) {
            return match side {
                Side::Input => m.awaiting_input,
                Side::Output => m.awaiting_pickup,
            };
        }
        match self.stations.get(id) {
            Some(s) if s.kind == EntityKind::IntermediateStore => match side {
                Side::Input => s.awaiting_input,
                Side::Output => s.awaiting_pickup,
            },
            _ => false,
        }
    }

    /// Source and Sink serve any number of robots and are never flagged.
    pub(crate) fn set_awaiting(&mut self, id: EntityId, side: Side, value: bool) {
        if let Some(m) = self.machines.get_mut(id) {
            match side {
                Side::Input => m.awaiting_input = value,
                Side::Output => m.awaiting_pickup = value,
            }
            return;
        }
        if let Some(s) = self.stations.get_mut(id)
            && s.kind == EntityKind::IntermediateStore
        {
            match side {
                Side::Input => s.awaiting_input = value,
                Side::Output => s.awaiting_pickup = value,
            }
        }
    }

    /// Credit packed units arriving at the Sink to open orders of that
    /// product, oldest release first.
    pub(crate) fn credit_delivery(&mut self, material: ProductionMaterial, quantity: u32) {
        let now = self.tick;
        self.flow.delivered += u64::from(quantity);
        let mut remaining = quantity;
        let mut i = 0;
        while i < self.active_orders.len() && remaining > 0 {
            let progress = &mut self.active_orders[i];
            if progress.order.product != material.product() {
                i += 1;
                continue;
            }
            let credited = remaining.min(progress.order.quantity - progress.delivered);
            progress.delivered += credited;
            remaining -= credited;
            if progress.delivered < progress.order.quantity {
                i += 1;
                continue;
            }
            let mut done = self.active_orders.remove(i);
            done.completed_at = Some(now);
            info!(
                "order {} completed at {now} ({} ticks after release)",
                done.order.id,
                now - done.released_at
            );
            self.event_bus.emit(Event::OrderCompleted {
                order: done.order.id,
                tick: now,
            });
            self.completed_orders.push(done);
        }
    }

    // -----------------------------------------------------------------------
    // Public accessors
    // -----------------------------------------------------------------------

    pub fn tick(&self) -> Ticks {
        self.tick
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn grid(&self) -> &FloorGrid {
        &self.grid
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// Hash of the state at the end of the last step.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    pub fn layout_report(&self) -> &LayoutReport {
        &self.layout
    }

    pub fn push_command(&mut self, command: SimCommand) {
        self.commands.push(command);
    }

    pub fn command_history(&self) -> &[(Ticks, SimCommand)] {
        self.commands.history()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }

    pub fn on_reactive(&mut self, kind: EventKind, handler: ReactiveHandler) {
        self.event_bus.on_reactive(kind, handler);
    }

    pub fn name_of(&self, id: EntityId) -> &str {
        self.entities.get(id).map_or("?", |e| e.name.as_str())
    }

    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        self.entities.get(id).map(|e| e.kind)
    }

    pub fn entity_by_name(&self, name: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, e)| e.name == name)
            .map(|(id, _)| id)
    }

    pub fn machine(&self, id: EntityId) -> Option<&Machine> {
        self.machines.get(id)
    }

    pub fn transport(&self, id: EntityId) -> Option<&TransportRobot> {
        self.transports.get(id)
    }

    pub fn operator(&self, id: EntityId) -> Option<&OperatorRobot> {
        self.operators.get(id)
    }

    pub fn station(&self, id: EntityId) -> Option<&Station> {
        self.stations.get(id)
    }

    pub fn machine_ids(&self) -> &[EntityId] {
        &self.machine_ids
    }

    pub fn transport_ids(&self) -> &[EntityId] {
        &self.transport_ids
    }

    pub fn operator_ids(&self) -> &[EntityId] {
        &self.operator_ids
    }

    pub fn source_ids(&self) -> &[EntityId] {
        &self.source_ids
    }

    pub fn sink_ids(&self) -> &[EntityId] {
        &self.sink_ids
    }

    pub fn store_ids(&self) -> &[EntityId] {
        &self.store_ids
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn active_orders(&self) -> &[OrderProgress] {
        &self.active_orders
    }

    pub fn completed_orders(&self) -> &[OrderProgress] {
        &self.completed_orders
    }

    /// Requests left unmatched by the last dispatch.
    pub fn pending_requests(&self) -> &[TransportRequest] {
        &self.pending_requests
    }

    pub fn flow(&self) -> FlowCounters {
        self.flow
    }

    /// Every order released and delivered.
    pub fn all_orders_complete(&self) -> bool {
        self.backlog.is_empty() && self.active_orders.is_empty()
    }
}

fn hash_store(h: &mut StateHash, store: &MaterialStore) {
    for stack in store.stacks() {
        h.write_u32(stack.material.product().0);
        h.write_u8(stack.material.step());
        h.write_u32(stack.quantity);
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Creates every entity, lays out the floor and validates the orders.
pub struct SimulationBuilder {
    registry: Registry,
    config: EngineConfig,
    orders: Vec<Order>,
    assignments: Vec<Assignment>,
}

struct Spawner {
    grid: FloorGrid,
    entities: SlotMap<EntityId, EntityInfo>,
    entries: Vec<LayoutEntry>,
}

impl Spawner {
    fn spawn(&mut self, kind: EntityKind, name: String, size: Size) -> Result<EntityId, SetupError> {
        let id = self.entities.insert(EntityInfo {
            kind,
            name: name.clone(),
        });
        self.grid
            .register(id, size)
            .map_err(|source| SetupError::InvalidFootprint {
                name: name.clone(),
                source,
            })?;
        self.entries.push(LayoutEntry {
            entity: id,
            kind,
            name,
        });
        Ok(id)
    }
}

impl SimulationBuilder {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            config: EngineConfig::default(),
            orders: Vec::new(),
            assignments: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn orders(mut self, orders: impl IntoIterator<Item = Order>) -> Self {
        self.orders.extend(orders);
        self
    }

    pub fn assignments(mut self, assignments: impl IntoIterator<Item = Assignment>) -> Self {
        self.assignments.extend(assignments);
        self
    }

    pub fn build(self) -> Result<Simulation, SetupError> {
        let SimulationBuilder {
            registry,
            config,
            mut orders,
            assignments,
        } = self;
        validate_orders(&registry, &orders)?;
        orders.sort_by_key(|o| (o.order_date, o.daily_sequence, o.id));

        let starting = registry.starting_conditions();
        let mut spawner = Spawner {
            grid: FloorGrid::new(starting.grid_width, starting.grid_height),
            entities: SlotMap::with_key(),
            entries: Vec::new(),
        };
        let mut stations = SecondaryMap::new();
        let mut machines = SecondaryMap::new();

        let source = spawner.spawn(EntityKind::Source, "Source".into(), registry.source_size())?;
        stations.insert(source, Station::new(EntityKind::Source, MaterialStore::unbounded()));
        let sink = spawner.spawn(EntityKind::Sink, "Sink".into(), registry.sink_size())?;
        stations.insert(sink, Station::new(EntityKind::Sink, MaterialStore::unbounded()));

        let mut machine_ids = Vec::new();
        for (machine_type, def) in registry.machine_types() {
            let first_old = def.count.saturating_sub(def.old_count);
            for i in 0..def.count {
                let quality = if i >= first_old {
                    MachineQuality::Old
                } else {
                    MachineQuality::New
                };
                let id = spawner.spawn(EntityKind::Machine, format!("{}-{}", def.name, i + 1), def.size)?;
                machines.insert(id, Machine::new(machine_type, def, quality));
                machine_ids.push(id);
            }
        }

        let store_def = registry.intermediate_stores();
        let mut store_ids = Vec::new();
        for i in 0..store_def.count {
            let id = spawner.spawn(
                EntityKind::IntermediateStore,
                format!("Store-{}", i + 1),
                store_def.size,
            )?;
            stations.insert(
                id,
                Station::new(EntityKind::IntermediateStore, MaterialStore::new(store_def.capacity)),
            );
            store_ids.push(id);
        }

        let tr_fleet = registry.transport_fleet();
        let wr_fleet = registry.operator_fleet();
        let mut transport_ids = Vec::new();
        for i in 0..tr_fleet.count {
            transport_ids.push(spawner.spawn(
                EntityKind::TransportRobot,
                format!("TR-{}", i + 1),
                tr_fleet.size,
            )?);
        }
        let mut operator_ids = Vec::new();
        for i in 0..wr_fleet.count {
            operator_ids.push(spawner.spawn(
                EntityKind::WorkingRobot,
                format!("WR-{}", i + 1),
                wr_fleet.size,
            )?);
        }

        // Aisles wide enough for the biggest robot.
        let aisle = [tr_fleet.size, wr_fleet.size]
            .iter()
            .map(|s| s.width.max(s.height))
            .max()
            .unwrap_or(1);
        let Spawner {
            mut grid,
            entities,
            entries,
        } = spawner;
        let layout = apply_layout(&mut grid, &entries, &assignments, aisle)?;
        if !layout.rejected.is_empty() {
            warn!("{} layout assignments rejected", layout.rejected.len());
        }

        let home_of = |id: EntityId| {
            grid.anchor(id).ok_or_else(|| {
                SetupError::Layout(LayoutError::NoRoom {
                    name: entities.get(id).map_or_else(String::new, |e| e.name.clone()),
                })
            })
        };
        let mut transports = SecondaryMap::new();
        for &id in &transport_ids {
            transports.insert(id, TransportRobot::new(tr_fleet, home_of(id)?));
        }
        let mut operators = SecondaryMap::new();
        for &id in &operator_ids {
            operators.insert(id, OperatorRobot::new(wr_fleet, home_of(id)?));
        }

        info!(
            "floor {}x{} ready: {} machines, {} stores, {} transport robots, {} operators, {} orders",
            grid.width(),
            grid.height(),
            machine_ids.len(),
            store_ids.len(),
            transport_ids.len(),
            operator_ids.len(),
            orders.len()
        );

        let mut sim = Simulation {
            tick: 0,
            rng: SimRng::new(config.seed),
            event_bus: EventBus::new(config.event_capacity),
            config,
            registry,
            grid,
            entities,
            machine_ids,
            transport_ids,
            operator_ids,
            source_ids: vec![source],
            sink_ids: vec![sink],
            store_ids,
            machines,
            transports,
            operators,
            stations,
            backlog: orders.into(),
            active_orders: Vec::new(),
            completed_orders: Vec::new(),
            pending_requests: Vec::new(),
            flow: FlowCounters::default(),
            scheduler: Scheduler::new(),
            commands: CommandQueue::with_max_history(256),
            run_mode: RunMode::Running,
            layout,
            activity: false,
            last_state_hash: 0,
        };
        sim.last_state_hash = sim.compute_state_hash();
        Ok(sim)
    }
}

/// Every order's routing must be servable by at least one machine.
fn validate_orders(registry: &Registry, orders: &[Order]) -> Result<(), SetupError> {
    for order in orders {
        let product = registry.product(order.product)?;
        for step in &product.steps {
            let def = registry.machine_type(step.machine_type)?;
            if def.count == 0 {
                return Err(SetupError::NoMachineOfType {
                    product: product.name.clone(),
                    machine_type: def.name.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClockMode;
    use floorsim_core::event::{Boundary, Issue};
    use floorsim_core::id::OrderId;
    use floorsim_core::order::ProcessingOrder;
    use floorsim_core::registry::RobotFleetDef;
    use floorsim_core::status::{MachineState, OperatorState, TransportState};
    use floorsim_core::test_utils::{order, single_machine_builder, two_step_builder};
    use floorsim_spatial::GridPosition;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn single_machine_sim(quantity: u32) -> Simulation {
        let (builder, _, product) = single_machine_builder();
        SimulationBuilder::new(builder.build().unwrap())
            .orders([order(1, product, quantity)])
            .build()
            .unwrap()
    }

    fn run_to_completion(sim: &mut Simulation, limit: Ticks) {
        while !sim.all_orders_complete() && sim.tick() < limit {
            sim.step().unwrap();
        }
        assert!(sim.all_orders_complete(), "orders still open at tick {}", sim.tick());
    }

    fn sink_units(sim: &Simulation) -> u32 {
        let sink = sim.sink_ids()[0];
        sim.station(sink).unwrap().store.total()
    }

    #[test]
    fn builder_creates_and_places_every_entity() {
        let sim = single_machine_sim(1);
        assert_eq!(sim.machine_ids().len(), 1);
        assert_eq!(sim.transport_ids().len(), 1);
        assert_eq!(sim.operator_ids().len(), 1);
        for (id, info) in &sim.entities {
            assert!(sim.grid().is_placed(id), "{} not placed", info.name);
        }
        sim.grid().check_consistency().unwrap();
        assert_eq!(sim.entity_by_name("A-1"), Some(sim.machine_ids()[0]));
    }

    #[test]
    fn missing_machine_type_is_fatal_at_setup() {
        let (mut builder, _, _) = single_machine_builder();
        let mut def = floorsim_core::test_utils::machine_def("Z", 5);
        def.count = 0;
        let z = builder.register_machine_type(def);
        let product = builder.register_product("Orphan", vec![floorsim_core::test_utils::step(z, 1)]);
        let err = SimulationBuilder::new(builder.build().unwrap())
            .orders([order(1, product, 1)])
            .build()
            .unwrap_err();
        assert!(matches!(err, SetupError::NoMachineOfType { ref machine_type, .. } if machine_type == "Z"));
    }

    #[test]
    fn single_order_reaches_the_sink() {
        let mut sim = single_machine_sim(3);
        run_to_completion(&mut sim, 2_000);

        let sink = sim.sink_ids()[0];
        let store = &sim.station(sink).unwrap().store;
        assert_eq!(store.total(), 3);
        assert!(store.stacks().iter().all(|s| s.material.is_packed()));

        let m = sim.machine(sim.machine_ids()[0]).unwrap();
        assert!(m.processing.is_empty());
        assert!(m.materials.is_empty());
        assert_eq!(m.stats.units_produced, 3);
        assert_eq!(sim.flow(), FlowCounters { released: 3, delivered: 3 });
        assert_eq!(sim.completed_orders()[0].order.id, OrderId(1));
        sim.grid().check_consistency().unwrap();
    }

    #[test]
    fn machine_goes_idle_and_operator_walks_home() {
        let mut sim = single_machine_sim(2);
        run_to_completion(&mut sim, 2_000);
        sim.run_until(sim.tick() + 200).unwrap();
        let m = sim.machine(sim.machine_ids()[0]).unwrap();
        assert_eq!(m.state, MachineState::Idle);
        let wr_id = sim.operator_ids()[0];
        let wr = sim.operator(wr_id).unwrap();
        assert_eq!(wr.state, OperatorState::Idle);
        assert_eq!(sim.grid().anchor(wr_id), Some(wr.home));
        let tr_id = sim.transport_ids()[0];
        let tr = sim.transport(tr_id).unwrap();
        assert_eq!(tr.state, TransportState::Idle);
        assert_eq!(sim.grid().anchor(tr_id), Some(tr.home));
    }

    #[test]
    fn two_step_product_flows_through_both_types() {
        let (builder, _, product) = two_step_builder();
        let mut sim = SimulationBuilder::new(builder.build().unwrap())
            .orders([order(1, product, 4)])
            .build()
            .unwrap();
        run_to_completion(&mut sim, 4_000);
        assert_eq!(sink_units(&sim), 4);
        for &id in sim.machine_ids() {
            assert_eq!(sim.machine(id).unwrap().stats.units_produced, 4);
        }
    }

    #[test]
    fn one_operator_is_shared_between_blocked_machines() {
        // A fills its output before B has input, so the single operator
        // has to move between them more than once.
        let (builder, _, product) = two_step_builder();
        let mut sim = SimulationBuilder::new(builder.build().unwrap())
            .orders([order(1, product, 12)])
            .build()
            .unwrap();
        run_to_completion(&mut sim, 4_000);
        assert_eq!(sink_units(&sim), 12);
        for &id in sim.machine_ids() {
            let m = sim.machine(id).unwrap();
            assert_eq!(m.stats.units_produced, 12);
            assert!(!m.yielded);
        }
        sim.grid().check_consistency().unwrap();
    }

    fn diagnostics_of(sim: &mut Simulation) -> Rc<RefCell<Vec<(EntityId, Issue)>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        sim.on_passive(
            EventKind::Diagnostic,
            Box::new(move |e| {
                if let Event::Diagnostic { entity, issue, .. } = e {
                    sink.borrow_mut().push((*entity, issue.clone()));
                }
            }),
        );
        seen
    }

    #[test]
    fn long_pause_is_reported_as_stuck() {
        let (mut builder, _, product) = single_machine_builder();
        builder.set_transport_fleet(RobotFleetDef {
            count: 0,
            ..RobotFleetDef::default()
        });
        let config = EngineConfig {
            stuck_threshold: 50,
            ..EngineConfig::default()
        };
        let mut sim = SimulationBuilder::new(builder.build().unwrap())
            .config(config)
            .orders([order(1, product, 2)])
            .build()
            .unwrap();
        let seen = diagnostics_of(&mut sim);
        sim.run_until(400).unwrap();

        let machine = sim.machine_ids()[0];
        assert_eq!(sim.machine(machine).unwrap().state, MachineState::PausedInputEmpty);
        let seen = seen.borrow();
        let stuck: Vec<Ticks> = seen
            .iter()
            .filter_map(|(e, issue)| match issue {
                Issue::Stuck { ticks } if *e == machine => Some(*ticks),
                _ => None,
            })
            .collect();
        assert!(stuck.len() >= 2, "stuck reports: {stuck:?}");
        assert!(stuck.iter().all(|t| t % 50 == 0));
    }

    #[test]
    fn missing_material_surfaces_after_retry_limit() {
        let (builder, [_, type_b], product) = two_step_builder();
        let config = EngineConfig {
            material_retry_limit: 5,
            ..EngineConfig::default()
        };
        let mut sim = SimulationBuilder::new(builder.build().unwrap())
            .config(config)
            .build()
            .unwrap();
        let seen = diagnostics_of(&mut sim);

        // Step 2 waits on an intermediate that nothing holds or produces.
        let intermediate = sim.registry.material(product, 1).unwrap();
        let work = ProcessingOrder {
            order: OrderId(1),
            product,
            step: 2,
            priority: 1,
            daily_sequence: 1,
        };
        let machine = sim
            .enqueue_step(work, ProcessMaterial::new(intermediate, 2).unwrap(), 0)
            .unwrap();
        assert_eq!(sim.machine(machine).unwrap().machine_type, type_b);

        sim.run_until(4).unwrap();
        assert!(seen.borrow().is_empty());
        sim.run_until(12).unwrap();

        let seen = seen.borrow();
        let misses: Vec<u32> = seen
            .iter()
            .filter_map(|(e, issue)| match issue {
                Issue::MaterialNotFound { material, attempts } if *e == machine => {
                    assert_eq!(*material, intermediate);
                    Some(*attempts)
                }
                _ => None,
            })
            .collect();
        // The counter resets after each report.
        assert_eq!(misses, vec![5, 5]);
    }

    #[test]
    fn same_seed_same_hashes() {
        let mut a = single_machine_sim(3);
        let mut b = single_machine_sim(3);
        for _ in 0..300 {
            a.step().unwrap();
            b.step().unwrap();
            assert_eq!(a.state_hash(), b.state_hash());
        }
    }

    #[test]
    fn event_driven_clock_delivers_the_same_goods() {
        let (builder, _, product) = single_machine_builder();
        let config = EngineConfig {
            clock: ClockMode::EventDriven,
            ..EngineConfig::default()
        };
        let mut late = order(1, product, 2);
        late.order_date = 500;
        let mut sim = SimulationBuilder::new(builder.build().unwrap())
            .config(config)
            .orders([late])
            .build()
            .unwrap();
        sim.step().unwrap();
        // Nothing happens before the order date, so the clock jumps.
        assert_eq!(sim.tick(), 500);
        run_to_completion(&mut sim, 2_000);
        assert_eq!(sink_units(&sim), 2);
    }

    #[test]
    fn stop_holds_everything_until_resume() {
        let mut sim = single_machine_sim(3);
        sim.run_until(5).unwrap();
        sim.push_command(SimCommand::Stop);
        sim.step().unwrap();
        let tr = sim.transport_ids()[0];
        let frozen = sim.grid().anchor(tr);
        sim.run_until(60).unwrap();
        assert_eq!(sim.run_mode(), RunMode::Stopped);
        assert_eq!(sim.grid().anchor(tr), frozen);
        assert_eq!(sink_units(&sim), 0);

        sim.push_command(SimCommand::Resume);
        run_to_completion(&mut sim, 2_000);
        assert_eq!(sink_units(&sim), 3);
    }

    #[test]
    fn reactive_handler_can_stop_production() {
        let mut sim = single_machine_sim(3);
        sim.on_reactive(
            EventKind::UnitProduced,
            Box::new(|_| vec![SimCommand::StopProduction]),
        );
        sim.run_until(400).unwrap();
        assert_eq!(sim.run_mode(), RunMode::ProductionStopped);
        // The second unit starts in the same step the first one finishes;
        // it completes, nothing after it starts.
        let m = sim.machine(sim.machine_ids()[0]).unwrap();
        assert_eq!(m.stats.units_produced, 2);
        assert_eq!(m.materials[0].qty_producing, 1);
    }

    #[test]
    fn boundary_events_are_observable() {
        let mut sim = single_machine_sim(3);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        sim.on_passive(
            EventKind::UnitsCompleted,
            Box::new(move |e| {
                if let Event::UnitsCompleted { boundary, quantity, .. } = e {
                    sink.borrow_mut().push((*boundary, *quantity));
                }
            }),
        );
        run_to_completion(&mut sim, 2_000);
        let seen = seen.borrow();
        let released: u32 = seen.iter().filter(|(b, _)| *b == Boundary::Released).map(|(_, q)| q).sum();
        let delivered: u32 = seen.iter().filter(|(b, _)| *b == Boundary::Delivered).map(|(_, q)| q).sum();
        assert_eq!((released, delivered), (3, 3));
    }

    #[test]
    fn operator_exit_restores_its_cells() {
        let mut sim = single_machine_sim(2);
        let wr = sim.operator_ids()[0];
        let mut entered_from = None;
        while !sim.all_orders_complete() && sim.tick() < 2_000 {
            let before = sim.grid().footprint(wr);
            sim.step().unwrap();
            if before.is_some() && !sim.grid().is_placed(wr) {
                entered_from = before;
            }
            if let Some(fp) = entered_from
                && sim.grid().is_placed(wr)
            {
                assert_eq!(sim.grid().footprint(wr), Some(fp));
                break;
            }
        }
        assert!(entered_from.is_some(), "operator never entered the machine");
    }

    #[test]
    fn operator_is_off_grid_while_working() {
        let mut sim = single_machine_sim(3);
        let wr = sim.operator_ids()[0];
        let machine = sim.machine_ids()[0];
        let mut saw_producing = false;
        while !sim.all_orders_complete() && sim.tick() < 2_000 {
            sim.step().unwrap();
            if sim.machine(machine).unwrap().state == MachineState::ProducingProduct {
                saw_producing = true;
                assert!(!sim.grid().is_placed(wr));
                assert_eq!(sim.operator(wr).unwrap().state, OperatorState::WorkingOnMachine);
            }
        }
        assert!(saw_producing);
    }

    #[test]
    fn assignment_places_named_entity() {
        let (builder, _, product) = single_machine_builder();
        let target = GridPosition::new(6, 6);
        let sim = SimulationBuilder::new(builder.build().unwrap())
            .orders([order(1, product, 1)])
            .assignments([Assignment {
                cell: target,
                name: "A-1".into(),
            }])
            .build()
            .unwrap();
        assert_eq!(sim.grid().anchor(sim.machine_ids()[0]), Some(target));
        assert_eq!(sim.layout_report().assigned.len(), 1);
    }

    #[test]
    fn utilization_counters_cover_every_tick() {
        let mut sim = single_machine_sim(2);
        sim.run_until(150).unwrap();
        let m = sim.machine(sim.machine_ids()[0]).unwrap();
        assert_eq!(m.stats.total_ticks(), 150);
        assert!(m.stats.ticks_in(MachineState::ProducingProduct) >= 6);
    }
}
