//! Transport robots: request generation, matching and the per-robot state
//! machine.
//!
//! Requests are rebuilt from machine state every tick. Each one names a
//! pick-up, a drop-off and the work item it serves; the queue is sorted by
//! that item's dispatch key and de-duplicated by (pick-up, drop-off).
//! Claiming a request flags both endpoints so the same transfer is never
//! generated twice. Source and Sink are never flagged.

use crate::engine::{RunMode, Side, Simulation};
use crate::error::SimError;
use crate::movement::{NavStep, Navigator};
use crate::scheduler::StepOutcome;
use floorsim_core::event::{Boundary, Event, Issue};
use floorsim_core::fixed::Ticks;
use floorsim_core::id::{EntityId, EntityKind};
use floorsim_core::material::ProductionMaterial;
use floorsim_core::order::ProcessingOrder;
use floorsim_core::registry::RobotFleetDef;
use floorsim_core::status::{StateChange, TransportState};
use floorsim_core::store::MaterialStore;
use floorsim_spatial::GridPosition;
use log::{debug, warn};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestKind {
    /// A machine asks for its input.
    Bring,
    /// A machine's output is ready to leave.
    Take,
}

/// A transfer waiting for a robot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportRequest {
    pub kind: RequestKind,
    pub pickup: EntityId,
    pub dropoff: EntityId,
    pub material: ProductionMaterial,
    pub quantity: u32,
    pub serves: ProcessingOrder,
}

/// The transfer a robot is executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportOrder {
    pub pickup: EntityId,
    pub dropoff: EntityId,
    pub material: ProductionMaterial,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct TransportRobot {
    pub state: TransportState,
    /// State to restore when a stop is lifted.
    pub paused_from: Option<TransportState>,
    pub order: Option<TransportOrder>,
    pub cargo: MaterialStore,
    pub home: GridPosition,
    pub ticks_per_cell: Ticks,
    pub transfer_ticks_per_unit: Ticks,
    pub(crate) nav: Navigator,
    pub(crate) busy_until: Option<Ticks>,
}

impl TransportRobot {
    pub fn new(fleet: &RobotFleetDef, home: GridPosition) -> Self {
        Self {
            state: TransportState::Idle,
            paused_from: None,
            order: None,
            cargo: MaterialStore::new(fleet.capacity),
            home,
            ticks_per_cell: fleet.ticks_per_cell.max(1),
            transfer_ticks_per_unit: fleet.transfer_ticks_per_unit,
            nav: Navigator::default(),
            busy_until: None,
        }
    }

    /// Idle robots and robots heading home can take a new order.
    pub fn is_available(&self) -> bool {
        matches!(self.state, TransportState::Idle | TransportState::Returning)
    }
}

// ---------------------------------------------------------------------------
// Request generation and matching
// ---------------------------------------------------------------------------

impl Simulation {
    /// Scan every machine once and build the sorted request queue.
    pub(crate) fn generate_transport_requests(&mut self) -> Vec<TransportRequest> {
        let mut requests = Vec::new();
        let mut lookups: Vec<(EntityId, Option<ProductionMaterial>)> = Vec::new();

        for &id in &self.machine_ids {
            let Some(m) = self.machines.get(id) else {
                continue;
            };
            if !m.awaiting_input
                && let Some((order, pm)) = m.head()
            {
                let need = m.input_needed();
                if need > 0 {
                    match self.locate_material(pm.required) {
                        Some((pickup, available)) => {
                            requests.push(TransportRequest {
                                kind: RequestKind::Bring,
                                pickup,
                                dropoff: id,
                                material: pm.required,
                                quantity: need.min(available),
                                serves: *order,
                            });
                            lookups.push((id, None));
                        }
                        None if !self.material_in_flight(pm.required) => {
                            lookups.push((id, Some(pm.required)));
                        }
                        None => {}
                    }
                }
            }
            if !m.awaiting_pickup
                && m.output_ready()
                && let Some(stack) = m.output.first()
                && let Some((dropoff, quantity, serves)) =
                    self.destination_for(stack.material, stack.quantity, m.output_origin)
            {
                requests.push(TransportRequest {
                    kind: RequestKind::Take,
                    pickup: id,
                    dropoff,
                    material: stack.material,
                    quantity,
                    serves,
                });
            }
        }

        for (id, missing) in lookups {
            self.record_material_lookup(id, missing);
        }

        requests.sort_by_key(|r| r.serves.dispatch_key());
        let mut seen = HashSet::new();
        requests.retain(|r| seen.insert((r.pickup, r.dropoff)));
        requests
    }

    /// Hand the head of the queue to each available robot in fleet order.
    /// Whatever is left stays visible as pending.
    pub(crate) fn match_transport_requests(&mut self, requests: Vec<TransportRequest>) {
        let mut queue: VecDeque<TransportRequest> = requests.into();
        let robots = self.transport_ids.clone();
        for robot in robots {
            if queue.is_empty() {
                break;
            }
            if !self.transports.get(robot).is_some_and(TransportRobot::is_available) {
                continue;
            }
            while let Some(request) = queue.pop_front() {
                if self.is_claimable(&request) {
                    self.assign_transport(robot, request);
                    break;
                }
            }
        }
        self.pending_requests = queue.into();
    }

    fn is_claimable(&self, request: &TransportRequest) -> bool {
        !self.is_awaiting(request.pickup, Side::Output) && !self.is_awaiting(request.dropoff, Side::Input)
    }

    fn assign_transport(&mut self, robot: EntityId, request: TransportRequest) {
        let now = self.tick;
        self.set_awaiting(request.pickup, Side::Output, true);
        self.set_awaiting(request.dropoff, Side::Input, true);
        let Some(t) = self.transports.get_mut(robot) else {
            return;
        };
        t.order = Some(TransportOrder {
            pickup: request.pickup,
            dropoff: request.dropoff,
            material: request.material,
            quantity: request.quantity,
        });
        t.nav.reset();
        debug!(
            "{} takes {} x{} from {} to {}",
            self.name_of(robot),
            self.registry.material_label(&request.material),
            request.quantity,
            self.name_of(request.pickup),
            self.name_of(request.dropoff)
        );
        self.event_bus.emit(Event::TransportAssigned {
            robot,
            pickup: request.pickup,
            dropoff: request.dropoff,
            material: request.material,
            quantity: request.quantity,
            tick: now,
        });
        self.set_transport_state(robot, TransportState::MovingToPickup);
        self.scheduler.wake(robot, now);
    }

    /// Where a machine can fetch `material` from, with the units on offer.
    fn locate_material(&self, material: ProductionMaterial) -> Option<(EntityId, u32)> {
        if material.is_raw() {
            return self.source_ids.first().map(|&s| (s, u32::MAX));
        }
        for &id in &self.machine_ids {
            if let Some(m) = self.machines.get(id)
                && !m.awaiting_pickup
            {
                let q = m.output.quantity(material);
                if q > 0 {
                    return Some((id, q));
                }
            }
        }
        for &id in &self.store_ids {
            if let Some(s) = self.stations.get(id)
                && !s.awaiting_pickup
            {
                let q = s.store.quantity(material);
                if q > 0 {
                    return Some((id, q));
                }
            }
        }
        None
    }

    /// Whether `material` exists anywhere or is still being produced.
    fn material_in_flight(&self, material: ProductionMaterial) -> bool {
        self.machines.values().any(|m| {
            m.output.contains(material)
                || m
                    .materials
                    .iter()
                    .any(|pm| pm.producing == material && !pm.is_finished())
        }) || self.transports.values().any(|t| t.cargo.contains(material))
            || self.stations.values().any(|s| s.store.contains(material))
    }

    /// Drop-off for output leaving a machine: the Sink for packed goods,
    /// else the machine whose head item needs it, else a store with room.
    fn destination_for(
        &self,
        material: ProductionMaterial,
        quantity: u32,
        origin: Option<ProcessingOrder>,
    ) -> Option<(EntityId, u32, ProcessingOrder)> {
        let origin = origin?;
        if material.is_packed() {
            return self.sink_ids.first().map(|&s| (s, quantity, origin));
        }
        for &id in &self.machine_ids {
            let Some(m) = self.machines.get(id) else {
                continue;
            };
            if m.awaiting_input {
                continue;
            }
            if let Some((order, pm)) = m.head()
                && pm.required == material
            {
                let need = m.input_needed();
                if need > 0 {
                    return Some((id, need.min(quantity), *order));
                }
            }
        }
        for &id in &self.store_ids {
            if let Some(s) = self.stations.get(id)
                && !s.awaiting_input
            {
                let free = s.store.free_capacity();
                if free > 0 {
                    return Some((id, free.min(quantity), origin));
                }
            }
        }
        None
    }

    fn record_material_lookup(&mut self, id: EntityId, missing: Option<ProductionMaterial>) {
        let limit = self.config.material_retry_limit;
        let Some(m) = self.machines.get_mut(id) else {
            return;
        };
        let Some(material) = missing else {
            m.material_misses = 0;
            return;
        };
        m.material_misses += 1;
        if limit == 0 || m.material_misses < limit {
            return;
        }
        let attempts = m.material_misses;
        m.material_misses = 0;
        warn!(
            "{} cannot find {} after {attempts} attempts",
            self.name_of(id),
            self.registry.material_label(&material)
        );
        self.event_bus.emit(Event::Diagnostic {
            entity: id,
            issue: Issue::MaterialNotFound { material, attempts },
            tick: self.tick,
        });
    }
}

// ---------------------------------------------------------------------------
// Robot step
// ---------------------------------------------------------------------------

impl Simulation {
    pub(crate) fn set_transport_state(&mut self, id: EntityId, to: TransportState) {
        let Some(t) = self.transports.get_mut(id) else {
            return;
        };
        let from = t.state;
        if from == to {
            return;
        }
        t.state = to;
        debug!("{} {:?} -> {:?} at {}", self.name_of(id), from, to, self.tick);
        self.event_bus.emit(Event::StateChanged {
            entity: id,
            change: StateChange::Transport { from, to },
            tick: self.tick,
        });
    }

    pub(crate) fn step_transport(&mut self, id: EntityId) -> Result<StepOutcome, SimError> {
        let now = self.tick;
        let t = self.transports.get_mut(id).ok_or(SimError::UnknownEntity)?;

        if self.run_mode == RunMode::Stopped {
            if t.state != TransportState::Paused {
                t.paused_from = Some(t.state);
                self.set_transport_state(id, TransportState::Paused);
            }
            return Ok(StepOutcome::Continue);
        }
        if t.state == TransportState::Paused {
            let prior = t.paused_from.take().unwrap_or(TransportState::Idle);
            self.set_transport_state(id, prior);
        }

        let t = self.transports.get_mut(id).ok_or(SimError::UnknownEntity)?;
        if let Some(until) = t.busy_until {
            if now < until {
                return Ok(StepOutcome::ResumeAt(until));
            }
            t.busy_until = None;
            let (state, emptied) = (t.state, t.cargo.is_empty());
            match state {
                TransportState::Loading => {
                    self.set_transport_state(id, TransportState::MovingToDropoff);
                }
                TransportState::Unloading if emptied => {
                    self.finish_transport(id);
                    return Ok(StepOutcome::Continue);
                }
                _ => {}
            }
        }

        let t = self.transports.get(id).ok_or(SimError::UnknownEntity)?;
        let state = t.state;
        let at_home = self.grid.anchor(id) == Some(t.home);
        let order = t.order.clone();
        match (state, order) {
            (TransportState::Idle, _) if at_home => Ok(StepOutcome::Done),
            (TransportState::Idle, _) => {
                self.set_transport_state(id, TransportState::Returning);
                Ok(StepOutcome::Continue)
            }
            (TransportState::Returning, _) => self.transport_return_home(id),
            (TransportState::MovingToPickup, Some(order)) => {
                if self.grid.is_adjacent(id, order.pickup) {
                    self.begin_loading(id, &order)
                } else {
                    self.transport_travel(id, order.pickup)
                }
            }
            (TransportState::MovingToDropoff, Some(order)) => {
                if self.grid.is_adjacent(id, order.dropoff) {
                    self.begin_unloading(id, &order)
                } else {
                    self.transport_travel(id, order.dropoff)
                }
            }
            (TransportState::Loading, Some(order)) => self.begin_loading(id, &order),
            (TransportState::Unloading, Some(order)) => self.begin_unloading(id, &order),
            (TransportState::Paused, _) => Ok(StepOutcome::Continue),
            (_, None) => {
                self.set_transport_state(id, TransportState::Idle);
                Ok(StepOutcome::Continue)
            }
        }
    }

    fn transport_travel(&mut self, id: EntityId, station: EntityId) -> Result<StepOutcome, SimError> {
        let goals = self.grid.docking_positions(id, station);
        let params = self.nav_params();
        let t = self.transports.get_mut(id).ok_or(SimError::UnknownEntity)?;
        let step = t.nav.advance(&mut self.grid, &mut self.rng, id, &goals, params);
        let ticks_per_cell = t.ticks_per_cell;
        Ok(self.after_nav(id, step, ticks_per_cell))
    }

    fn transport_return_home(&mut self, id: EntityId) -> Result<StepOutcome, SimError> {
        let params = self.nav_params();
        let t = self.transports.get_mut(id).ok_or(SimError::UnknownEntity)?;
        let home = [t.home];
        let step = t.nav.advance(&mut self.grid, &mut self.rng, id, &home, params);
        let ticks_per_cell = t.ticks_per_cell;
        if step == NavStep::Arrived {
            self.set_transport_state(id, TransportState::Idle);
            return Ok(StepOutcome::Done);
        }
        Ok(self.after_nav(id, step, ticks_per_cell))
    }

    pub(crate) fn after_nav(&mut self, id: EntityId, step: NavStep, ticks_per_cell: Ticks) -> StepOutcome {
        match step {
            NavStep::Moved => StepOutcome::ResumeAt(self.tick + ticks_per_cell),
            NavStep::Arrived | NavStep::Waiting => StepOutcome::Continue,
            NavStep::Stuck(ticks) => {
                self.report_stuck(id, ticks);
                StepOutcome::Continue
            }
        }
    }

    pub(crate) fn report_stuck(&mut self, id: EntityId, ticks: Ticks) {
        warn!("{} blocked for {ticks} ticks at {}", self.name_of(id), self.tick);
        self.event_bus.emit(Event::Diagnostic {
            entity: id,
            issue: Issue::Stuck { ticks },
            tick: self.tick,
        });
    }

    fn begin_loading(&mut self, id: EntityId, order: &TransportOrder) -> Result<StepOutcome, SimError> {
        let now = self.tick;
        let room = self
            .transports
            .get(id)
            .ok_or(SimError::UnknownEntity)?
            .cargo
            .free_capacity();
        let quantity = order
            .quantity
            .min(room)
            .min(self.room_for(order.dropoff))
            .min(self.available_at(order.pickup, order.material));
        if quantity == 0 {
            debug!("{} finds nothing to load at {}", self.name_of(id), self.name_of(order.pickup));
            self.set_awaiting(order.pickup, Side::Output, false);
            self.set_awaiting(order.dropoff, Side::Input, false);
            if let Some(t) = self.transports.get_mut(id) {
                t.order = None;
            }
            self.set_transport_state(id, TransportState::Idle);
            return Ok(StepOutcome::Continue);
        }

        let taken = self.take_from(order.pickup, order.material, quantity);
        let t = self.transports.get_mut(id).ok_or(SimError::UnknownEntity)?;
        let overflow = t.cargo.add(order.material, taken);
        debug_assert_eq!(overflow, 0);
        let until = now + t.transfer_ticks_per_unit * u64::from(taken);
        t.busy_until = Some(until);
        if self.kind_of(order.pickup) == Some(EntityKind::Source) {
            self.flow.released += u64::from(taken);
            self.event_bus.emit(Event::UnitsCompleted {
                boundary: Boundary::Released,
                material: order.material,
                quantity: taken,
                tick: now,
            });
        }
        self.set_awaiting(order.pickup, Side::Output, false);
        if self.machines.contains_key(order.pickup) {
            self.scheduler.wake(order.pickup, now + 1);
        }
        self.set_transport_state(id, TransportState::Loading);
        Ok(StepOutcome::ResumeAt(until))
    }

    fn begin_unloading(&mut self, id: EntityId, order: &TransportOrder) -> Result<StepOutcome, SimError> {
        let now = self.tick;
        let carried = self
            .transports
            .get(id)
            .ok_or(SimError::UnknownEntity)?
            .cargo
            .quantity(order.material);
        if carried == 0 {
            self.finish_transport(id);
            return Ok(StepOutcome::Continue);
        }
        let accepted = self.put_into(order.dropoff, order.material, carried);
        let t = self.transports.get_mut(id).ok_or(SimError::UnknownEntity)?;
        let removed = t.cargo.remove(order.material, accepted);
        debug_assert_eq!(removed, accepted);
        self.set_transport_state(id, TransportState::Unloading);
        if accepted == 0 {
            return Ok(StepOutcome::Continue);
        }
        let t = self.transports.get_mut(id).ok_or(SimError::UnknownEntity)?;
        let until = now + t.transfer_ticks_per_unit * u64::from(accepted);
        t.busy_until = Some(until);
        if self.kind_of(order.dropoff) == Some(EntityKind::Sink) {
            self.event_bus.emit(Event::UnitsCompleted {
                boundary: Boundary::Delivered,
                material: order.material,
                quantity: accepted,
                tick: now,
            });
            self.credit_delivery(order.material, accepted);
        }
        if self.machines.contains_key(order.dropoff) {
            self.scheduler.wake(order.dropoff, now + 1);
        }
        Ok(StepOutcome::ResumeAt(until))
    }

    fn finish_transport(&mut self, id: EntityId) {
        let Some(t) = self.transports.get_mut(id) else {
            return;
        };
        if let Some(order) = t.order.take() {
            self.set_awaiting(order.dropoff, Side::Input, false);
        }
        self.set_transport_state(id, TransportState::Idle);
    }

    /// Units of any material the drop-off can still take.
    fn room_for(&self, dropoff: EntityId) -> u32 {
        if let Some(m) = self.machines.get(dropoff) {
            return m.input.free_capacity();
        }
        match self.stations.get(dropoff) {
            Some(s) if s.kind != EntityKind::Source => s.store.free_capacity(),
            _ => 0,
        }
    }

    fn available_at(&self, pickup: EntityId, material: ProductionMaterial) -> u32 {
        if let Some(m) = self.machines.get(pickup) {
            return m.output.quantity(material);
        }
        match self.stations.get(pickup) {
            Some(s) if s.kind == EntityKind::Source => {
                if material.is_raw() {
                    u32::MAX
                } else {
                    0
                }
            }
            Some(s) => s.store.quantity(material),
            None => 0,
        }
    }

    /// Remove up to `quantity` units from the pick-up. The Source has an
    /// endless supply of raw material.
    fn take_from(&mut self, pickup: EntityId, material: ProductionMaterial, quantity: u32) -> u32 {
        if let Some(m) = self.machines.get_mut(pickup) {
            return m.output.remove(material, quantity);
        }
        match self.stations.get_mut(pickup) {
            Some(s) if s.kind == EntityKind::Source => {
                if material.is_raw() {
                    quantity
                } else {
                    0
                }
            }
            Some(s) => s.store.remove(material, quantity),
            None => 0,
        }
    }

    /// Add as many of `quantity` units as fit. Returns the units accepted.
    fn put_into(&mut self, dropoff: EntityId, material: ProductionMaterial, quantity: u32) -> u32 {
        if let Some(m) = self.machines.get_mut(dropoff) {
            return quantity - m.input.add(material, quantity);
        }
        match self.stations.get_mut(dropoff) {
            Some(s) if s.kind != EntityKind::Source => quantity - s.store.add(material, quantity),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floorsim_core::registry::Size;

    #[test]
    fn idle_and_returning_robots_are_available() {
        let fleet = RobotFleetDef {
            count: 1,
            size: Size::UNIT,
            ticks_per_cell: 0,
            transfer_ticks_per_unit: 1,
            capacity: 4,
        };
        let mut robot = TransportRobot::new(&fleet, GridPosition::new(0, 0));
        assert_eq!(robot.ticks_per_cell, 1);
        assert_eq!(robot.cargo.capacity(), Some(4));
        assert!(robot.is_available());
        robot.state = TransportState::Returning;
        assert!(robot.is_available());
        robot.state = TransportState::Loading;
        assert!(!robot.is_available());
    }
}
