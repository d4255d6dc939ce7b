//! Machine runtime state and the production step.
//!
//! A machine works through its processing list head first. It needs an
//! operator whenever the list is non-empty, pays its setup time whenever
//! the material it produces changes, and pauses (polling every tick) while
//! the input lacks the required material or the output cannot take the
//! next unit.

use crate::engine::{RunMode, Simulation};
use crate::error::SimError;
use crate::plan;
use crate::scheduler::StepOutcome;
use floorsim_core::event::Event;
use floorsim_core::fixed::{Fixed64, Ticks, per_unit_ticks};
use floorsim_core::id::{EntityId, MachineTypeId};
use floorsim_core::material::ProductionMaterial;
use floorsim_core::order::{ProcessMaterial, ProcessingOrder};
use floorsim_core::registry::MachineTypeDef;
use floorsim_core::status::{MachineState, StateChange};
use floorsim_core::store::MaterialStore;
use log::debug;
use serde::Serialize;

/// Whether an operator robot is attached to a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OperatorPresence {
    #[default]
    None,
    /// Dispatched and on its way.
    Waiting(EntityId),
    /// Inside the machine.
    Present(EntityId),
    /// Released; still inside until it manages to exit.
    Leaving(EntityId),
}

impl OperatorPresence {
    pub fn robot(&self) -> Option<EntityId> {
        match *self {
            OperatorPresence::None => None,
            OperatorPresence::Waiting(r)
            | OperatorPresence::Present(r)
            | OperatorPresence::Leaving(r) => Some(r),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MachineQuality {
    New,
    /// Pays a 20% penalty in queue estimates.
    Old,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MachineStats {
    pub ticks_in_state: [Ticks; MachineState::ALL.len()],
    pub units_produced: u64,
}

impl MachineStats {
    pub fn ticks_in(&self, state: MachineState) -> Ticks {
        self.ticks_in_state[state.index()]
    }

    pub fn total_ticks(&self) -> Ticks {
        self.ticks_in_state.iter().sum()
    }

    /// Share of elapsed ticks spent producing, in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        let total = self.total_ticks();
        if total == 0 {
            return 0.0;
        }
        self.ticks_in(MachineState::ProducingProduct) as f64 / total as f64
    }
}

/// A timed action in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Busy {
    Setup(ProductionMaterial),
    Unit(ProductionMaterial),
}

#[derive(Debug, Clone)]
pub struct Machine {
    pub machine_type: MachineTypeId,
    pub quality: MachineQuality,
    pub speed: Fixed64,
    pub setup_time: Ticks,
    pub input: MaterialStore,
    pub output: MaterialStore,
    pub state: MachineState,
    pub operator: OperatorPresence,
    /// Index-aligned with `materials`.
    pub processing: Vec<ProcessingOrder>,
    pub materials: Vec<ProcessMaterial>,
    /// Material the machine is currently set up to produce.
    pub set_up_for: Option<ProductionMaterial>,
    /// A transport robot is bringing input.
    pub awaiting_input: bool,
    /// A transport robot is coming for the output.
    pub awaiting_pickup: bool,
    /// Work item whose units sit in the output store.
    pub output_origin: Option<ProcessingOrder>,
    pub stats: MachineStats,
    /// Gave its operator away while paused; not staffed again until the
    /// pause cause clears.
    pub yielded: bool,
    pub(crate) paused_since: Option<Ticks>,
    pub(crate) busy: Option<(Busy, Ticks)>,
    pub(crate) material_misses: u32,
}

impl Machine {
    pub fn new(machine_type: MachineTypeId, def: &MachineTypeDef, quality: MachineQuality) -> Self {
        Self {
            machine_type,
            quality,
            speed: def.working_speed,
            setup_time: def.setup_time,
            input: MaterialStore::new(def.capacity_before),
            output: MaterialStore::new(def.capacity_after),
            state: MachineState::Idle,
            operator: OperatorPresence::None,
            processing: Vec::new(),
            materials: Vec::new(),
            set_up_for: None,
            awaiting_input: false,
            awaiting_pickup: false,
            output_origin: None,
            stats: MachineStats::default(),
            yielded: false,
            paused_since: None,
            busy: None,
            material_misses: 0,
        }
    }

    pub fn is_old(&self) -> bool {
        self.quality == MachineQuality::Old
    }

    pub fn head(&self) -> Option<(&ProcessingOrder, &ProcessMaterial)> {
        self.processing.first().zip(self.materials.first())
    }

    pub fn needs_operator(&self) -> bool {
        !self.processing.is_empty()
    }

    /// Has work, has not given its operator away, and no operator is on
    /// the way or inside.
    pub fn wants_operator(&self) -> bool {
        self.needs_operator()
            && !self.yielded
            && matches!(self.operator, OperatorPresence::None | OperatorPresence::Leaving(_))
    }

    /// The head item cannot start a unit: the output cannot take it or the
    /// input lacks the required material.
    pub fn blocked(&self) -> bool {
        let Some(pm) = self.materials.first() else {
            return false;
        };
        self.output.is_full()
            || self.output.holds_other_than(pm.producing)
            || !self.input.contains(pm.required)
    }

    /// Material of the run currently underway, if any.
    pub fn in_production(&self) -> Option<ProductionMaterial> {
        self.materials
            .first()
            .filter(|pm| pm.started && !pm.is_finished())
            .map(|pm| pm.producing)
    }

    /// Input units the head item still needs that are not staged yet,
    /// limited by the free input capacity.
    pub fn input_needed(&self) -> u32 {
        let Some(pm) = self.materials.first() else {
            return 0;
        };
        pm.qty_required
            .saturating_sub(self.input.quantity(pm.required))
            .min(self.input.free_capacity())
    }

    /// Non-empty and either full, holding something other than the
    /// material in production, or left over from a finished run.
    pub fn output_ready(&self) -> bool {
        let Some(stack) = self.output.first() else {
            return false;
        };
        self.output.is_full() || self.in_production() != Some(stack.material)
    }

    /// Head stays in place while the machine waits for a robot, has input
    /// staged or is mid-run.
    pub fn head_pinned(&self) -> bool {
        self.awaiting_input
            || matches!(self.operator, OperatorPresence::Waiting(_))
            || !self.input.is_empty()
            || self.materials.first().is_some_and(|pm| pm.started)
    }

    /// Queue a work item and restore list order.
    pub fn enqueue(&mut self, order: ProcessingOrder, material: ProcessMaterial) {
        self.processing.push(order);
        self.materials.push(material);
        plan::sort_processing_list(self);
    }

    pub(crate) fn pop_head(&mut self) {
        if !self.processing.is_empty() {
            self.processing.remove(0);
            self.materials.remove(0);
        }
    }
}

// ---------------------------------------------------------------------------
// Production step
// ---------------------------------------------------------------------------

impl Simulation {
    pub(crate) fn set_machine_state(&mut self, id: EntityId, to: MachineState) {
        let Some(m) = self.machines.get_mut(id) else {
            return;
        };
        let from = m.state;
        if from == to {
            return;
        }
        m.state = to;
        debug!("{} {:?} -> {:?} at {}", self.name_of(id), from, to, self.tick);
        self.event_bus.emit(Event::StateChanged {
            entity: id,
            change: StateChange::Machine { from, to },
            tick: self.tick,
        });
    }

    pub(crate) fn step_machine(&mut self, id: EntityId) -> Result<StepOutcome, SimError> {
        if self.run_mode == RunMode::Stopped {
            return Ok(StepOutcome::Continue);
        }
        let now = self.tick;
        let machine = self.machines.get_mut(id).ok_or(SimError::UnknownEntity)?;
        if let Some((busy, until)) = machine.busy {
            if now < until {
                return Ok(StepOutcome::ResumeAt(until));
            }
            machine.busy = None;
            match busy {
                Busy::Setup(material) => {
                    machine.set_up_for = Some(material);
                    self.set_machine_state(id, MachineState::ReadyToProduce);
                }
                Busy::Unit(material) => self.finish_unit(id, material)?,
            }
        }
        self.advance_machine(id)
    }

    fn finish_unit(&mut self, id: EntityId, material: ProductionMaterial) -> Result<(), SimError> {
        let now = self.tick;
        let machine = self.machines.get_mut(id).ok_or(SimError::UnknownEntity)?;
        let overflow = machine.output.add(material, 1);
        debug_assert_eq!(overflow, 0, "output space is checked before a unit starts");
        machine.output_origin = machine.processing.first().copied();
        machine.stats.units_produced += 1;
        let finished = match machine.materials.first_mut() {
            Some(pm) => pm.complete_unit()?,
            None => false,
        };
        if finished {
            machine.pop_head();
        }
        self.event_bus.emit(Event::UnitProduced {
            machine: id,
            material,
            tick: now,
        });
        if finished {
            self.set_machine_state(id, MachineState::FinishedToProduce);
        }
        Ok(())
    }

    fn advance_machine(&mut self, id: EntityId) -> Result<StepOutcome, SimError> {
        let now = self.tick;
        let production_allowed = self.run_mode == RunMode::Running;
        let machine = self.machines.get_mut(id).ok_or(SimError::UnknownEntity)?;

        if machine.processing.is_empty() {
            machine.yielded = false;
            machine.paused_since = None;
            if let OperatorPresence::Present(wr) = machine.operator {
                machine.operator = OperatorPresence::Leaving(wr);
                debug!("{} releases its operator at {now}", self.name_of(id));
                self.scheduler.schedule(wr, now + 1);
            }
            self.set_machine_state(id, MachineState::Idle);
            return Ok(StepOutcome::Done);
        }
        if !matches!(machine.operator, OperatorPresence::Present(_)) {
            machine.paused_since = None;
            if machine.yielded {
                if machine.blocked() {
                    return Ok(StepOutcome::Done);
                }
                machine.yielded = false;
                debug!("{} can resume, wants an operator at {now}", self.name_of(id));
            }
            self.set_machine_state(id, MachineState::WaitingNextOrder);
            return Ok(StepOutcome::Done);
        }
        if !production_allowed {
            return Ok(StepOutcome::Continue);
        }

        let (order, pm) = match machine.head() {
            Some((o, pm)) => (*o, pm.clone()),
            None => return Ok(StepOutcome::Done),
        };
        if machine.set_up_for != Some(pm.producing) {
            if machine.setup_time > 0 {
                machine.paused_since = None;
                let until = now + machine.setup_time;
                machine.busy = Some((Busy::Setup(pm.producing), until));
                self.set_machine_state(id, MachineState::Setup);
                return Ok(StepOutcome::ResumeAt(until));
            }
            machine.set_up_for = Some(pm.producing);
        }
        if machine.output.is_full() || machine.output.holds_other_than(pm.producing) {
            return self.pause_machine(id, MachineState::PausedOutputFull);
        }
        if !machine.input.contains(pm.required) {
            return self.pause_machine(id, MachineState::PausedInputEmpty);
        }

        let processing_time = self.registry.step(order.product, order.step)?.processing_time;
        let machine = self.machines.get_mut(id).ok_or(SimError::UnknownEntity)?;
        machine.paused_since = None;
        let removed = machine.input.remove(pm.required, 1);
        debug_assert_eq!(removed, 1);
        if let Some(head) = machine.materials.first_mut() {
            head.consume_input()?;
        }
        let until = now + per_unit_ticks(processing_time, machine.speed);
        machine.busy = Some((Busy::Unit(pm.producing), until));
        self.set_machine_state(id, MachineState::ProducingProduct);

        if !pm.started && !pm.producing.is_packed() {
            // First unit of the run: the next step can be planned now.
            let next = ProcessMaterial::new(pm.producing, pm.qty_producing)?;
            self.enqueue_step(order.next_step(), next, now + 1)?;
        }
        Ok(StepOutcome::ResumeAt(until))
    }

    /// Hold in `state` and poll again next tick. A pause that outlasts
    /// `operator_release_after` hands the operator to a machine waiting for
    /// one; every `stuck_threshold` paused ticks raise a diagnostic.
    fn pause_machine(&mut self, id: EntityId, state: MachineState) -> Result<StepOutcome, SimError> {
        let now = self.tick;
        self.set_machine_state(id, state);
        let machine = self.machines.get_mut(id).ok_or(SimError::UnknownEntity)?;
        let paused = now - *machine.paused_since.get_or_insert(now);
        let threshold = self.config.stuck_threshold;
        if threshold > 0 && paused > 0 && paused % threshold == 0 {
            self.report_stuck(id, paused);
        }
        if paused < self.config.operator_release_after {
            return Ok(StepOutcome::Continue);
        }
        let others_waiting = self
            .machine_ids
            .iter()
            .any(|&m| m != id && self.machines.get(m).is_some_and(Machine::wants_operator));
        if !others_waiting {
            return Ok(StepOutcome::Continue);
        }
        let machine = self.machines.get_mut(id).ok_or(SimError::UnknownEntity)?;
        let OperatorPresence::Present(wr) = machine.operator else {
            return Ok(StepOutcome::Continue);
        };
        machine.operator = OperatorPresence::Leaving(wr);
        machine.yielded = true;
        machine.paused_since = None;
        debug!("{} paused {paused} ticks, hands its operator over at {now}", self.name_of(id));
        self.scheduler.schedule(wr, now + 1);
        Ok(StepOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floorsim_core::id::{OrderId, ProductId};
    use floorsim_core::test_utils::machine_def;

    fn raw() -> ProductionMaterial {
        ProductionMaterial::raw(ProductId(0), 2).unwrap()
    }

    fn work(qty: u32) -> (ProcessingOrder, ProcessMaterial) {
        let po = ProcessingOrder {
            order: OrderId(1),
            product: ProductId(0),
            step: 1,
            priority: 1,
            daily_sequence: 1,
        };
        (po, ProcessMaterial::new(raw(), qty).unwrap())
    }

    fn machine() -> Machine {
        Machine::new(MachineTypeId(0), &machine_def("A", 5), MachineQuality::New)
    }

    #[test]
    fn input_needed_subtracts_staged_units() {
        let mut m = machine();
        let (po, pm) = work(4);
        m.enqueue(po, pm);
        assert_eq!(m.input_needed(), 4);
        assert_eq!(m.input.add(raw(), 3), 0);
        assert_eq!(m.input_needed(), 1);
    }

    #[test]
    fn input_needed_is_capped_by_capacity() {
        let mut m = machine();
        let (po, pm) = work(9);
        m.enqueue(po, pm);
        assert_eq!(m.input_needed(), 5);
    }

    #[test]
    fn partial_output_is_ready_once_the_run_finished() {
        let mut m = machine();
        let (po, pm) = work(3);
        let produced = pm.producing;
        m.enqueue(po, pm);
        m.materials[0].consume_input().unwrap();
        assert_eq!(m.output.add(produced, 1), 0);
        assert!(!m.output_ready(), "run still producing this material");
        m.pop_head();
        assert!(m.output_ready());
    }

    #[test]
    fn full_output_is_ready() {
        let mut m = machine();
        let (po, pm) = work(9);
        let produced = pm.producing;
        m.enqueue(po, pm);
        m.materials[0].consume_input().unwrap();
        assert_eq!(m.output.add(produced, 5), 0);
        assert!(m.output_ready());
    }

    #[test]
    fn empty_output_is_never_ready() {
        assert!(!machine().output_ready());
    }

    #[test]
    fn utilization_is_share_of_producing_ticks() {
        let mut stats = MachineStats::default();
        stats.ticks_in_state[MachineState::ProducingProduct.index()] = 3;
        stats.ticks_in_state[MachineState::Idle.index()] = 1;
        assert!((stats.utilization() - 0.75).abs() < 1e-9);
        assert_eq!(MachineStats::default().utilization(), 0.0);
    }

    #[test]
    fn presence_reports_robot() {
        assert_eq!(OperatorPresence::None.robot(), None);
    }
}
