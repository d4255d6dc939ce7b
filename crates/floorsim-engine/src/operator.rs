//! Operator robots: dispatch to machines and the per-robot state machine.
//!
//! An operator walks to a docking position of its machine, then enters it:
//! its cells are removed from the grid and the vacated footprint is kept so
//! the exit restores exactly the same cells.

use crate::engine::{RunMode, Simulation};
use crate::error::SimError;
use crate::machine::OperatorPresence;
use crate::movement::{NavStep, Navigator};
use crate::scheduler::StepOutcome;
use floorsim_core::event::Event;
use floorsim_core::fixed::Ticks;
use floorsim_core::id::EntityId;
use floorsim_core::registry::RobotFleetDef;
use floorsim_core::status::{OperatorState, StateChange};
use floorsim_spatial::{Footprint, GridPosition};
use log::debug;

#[derive(Debug, Clone)]
pub struct OperatorRobot {
    pub state: OperatorState,
    /// Machine this robot is assigned to.
    pub machine: Option<EntityId>,
    pub home: GridPosition,
    pub ticks_per_cell: Ticks,
    /// Cells given up on entering a machine.
    pub(crate) vacated: Option<Footprint>,
    pub(crate) exit_blocked: Ticks,
    pub(crate) nav: Navigator,
}

impl OperatorRobot {
    pub fn new(fleet: &RobotFleetDef, home: GridPosition) -> Self {
        Self {
            state: OperatorState::Idle,
            machine: None,
            home,
            ticks_per_cell: fleet.ticks_per_cell.max(1),
            vacated: None,
            exit_blocked: 0,
            nav: Navigator::default(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, OperatorState::Idle | OperatorState::Returning)
    }

    /// Inside a machine and off the grid.
    pub fn is_inside(&self) -> bool {
        matches!(
            self.state,
            OperatorState::WorkingOnMachine | OperatorState::WaitingToExit
        )
    }
}

impl Simulation {
    pub(crate) fn set_operator_state(&mut self, id: EntityId, to: OperatorState) {
        let Some(w) = self.operators.get_mut(id) else {
            return;
        };
        let from = w.state;
        if from == to {
            return;
        }
        w.state = to;
        debug!("{} {:?} -> {:?} at {}", self.name_of(id), from, to, self.tick);
        self.event_bus.emit(Event::StateChanged {
            entity: id,
            change: StateChange::Operator { from, to },
            tick: self.tick,
        });
    }

    fn presence(&self, machine: Option<EntityId>) -> OperatorPresence {
        machine
            .and_then(|m| self.machines.get(m))
            .map(|m| m.operator)
            .unwrap_or_default()
    }

    fn set_presence(&mut self, machine: EntityId, presence: OperatorPresence) {
        if let Some(m) = self.machines.get_mut(machine) {
            m.operator = presence;
        }
    }

    /// Give every machine that needs an operator one, most urgent first.
    /// A robot still inside a machine it was leaving is reclaimed. Machines
    /// that yielded their operator wait until their pause cause clears.
    pub(crate) fn dispatch_operators(&mut self) {
        let now = self.tick;
        let mut wanting: Vec<_> = self
            .machine_ids
            .iter()
            .filter_map(|&id| {
                let m = self.machines.get(id)?;
                let (order, _) = m.head()?;
                m.wants_operator().then_some((order.dispatch_key(), id))
            })
            .collect();
        wanting.sort_by_key(|(key, _)| *key);

        for (_, machine) in wanting {
            if let OperatorPresence::Leaving(wr) = self.presence(Some(machine))
                && self
                    .operators
                    .get(wr)
                    .is_some_and(|w| w.is_inside() && w.machine == Some(machine))
            {
                debug!("{} keeps {}", self.name_of(machine), self.name_of(wr));
                self.set_presence(machine, OperatorPresence::Present(wr));
                if let Some(w) = self.operators.get_mut(wr) {
                    w.exit_blocked = 0;
                }
                self.set_operator_state(wr, OperatorState::WorkingOnMachine);
                self.scheduler.wake(machine, now);
                continue;
            }

            let Some(wr) = self
                .operator_ids
                .iter()
                .copied()
                .find(|&w| self.operators.get(w).is_some_and(OperatorRobot::is_available))
            else {
                break;
            };
            self.set_presence(machine, OperatorPresence::Waiting(wr));
            if let Some(w) = self.operators.get_mut(wr) {
                w.machine = Some(machine);
                w.nav.reset();
            }
            debug!("{} sent to {}", self.name_of(wr), self.name_of(machine));
            self.set_operator_state(wr, OperatorState::MovingToMachine);
            self.scheduler.wake(wr, now);
        }
    }

    pub(crate) fn step_operator(&mut self, id: EntityId) -> Result<StepOutcome, SimError> {
        if self.run_mode == RunMode::Stopped {
            return Ok(StepOutcome::Continue);
        }
        let now = self.tick;
        let w = self.operators.get(id).ok_or(SimError::UnknownEntity)?;
        let (state, machine, home) = (w.state, w.machine, w.home);
        let presence = self.presence(machine);

        match state {
            OperatorState::Idle => {
                if self.grid.anchor(id) == Some(home) {
                    Ok(StepOutcome::Done)
                } else {
                    self.set_operator_state(id, OperatorState::Returning);
                    Ok(StepOutcome::Continue)
                }
            }
            OperatorState::Returning => {
                let params = self.nav_params();
                let w = self.operators.get_mut(id).ok_or(SimError::UnknownEntity)?;
                let step = w.nav.advance(&mut self.grid, &mut self.rng, id, &[home], params);
                let ticks_per_cell = w.ticks_per_cell;
                if step == NavStep::Arrived {
                    self.set_operator_state(id, OperatorState::Idle);
                    return Ok(StepOutcome::Done);
                }
                Ok(self.after_nav(id, step, ticks_per_cell))
            }
            OperatorState::MovingToMachine | OperatorState::WaitingInFrontOfMachine => {
                let Some(machine) = machine.filter(|_| presence == OperatorPresence::Waiting(id)) else {
                    self.give_up_assignment(id);
                    return Ok(StepOutcome::Continue);
                };
                if !self.grid.is_adjacent(id, machine) {
                    let goals = self.grid.docking_positions(id, machine);
                    let params = self.nav_params();
                    let w = self.operators.get_mut(id).ok_or(SimError::UnknownEntity)?;
                    let step = w.nav.advance(&mut self.grid, &mut self.rng, id, &goals, params);
                    let ticks_per_cell = w.ticks_per_cell;
                    return Ok(self.after_nav(id, step, ticks_per_cell));
                }
                if state == OperatorState::MovingToMachine {
                    self.set_operator_state(id, OperatorState::WaitingInFrontOfMachine);
                    return Ok(StepOutcome::Continue);
                }
                let vacated = self.grid.remove(id)?;
                if let Some(w) = self.operators.get_mut(id) {
                    w.vacated = Some(vacated);
                    w.nav.reset();
                }
                self.set_presence(machine, OperatorPresence::Present(id));
                self.set_operator_state(id, OperatorState::WorkingOnMachine);
                self.scheduler.wake(machine, now + 1);
                Ok(StepOutcome::Done)
            }
            OperatorState::WorkingOnMachine => {
                if machine.is_some() && presence == OperatorPresence::Leaving(id) {
                    self.set_operator_state(id, OperatorState::WaitingToExit);
                    return self.try_exit(id);
                }
                Ok(StepOutcome::Done)
            }
            OperatorState::WaitingToExit => {
                if presence == OperatorPresence::Present(id) {
                    self.set_operator_state(id, OperatorState::WorkingOnMachine);
                    return Ok(StepOutcome::Done);
                }
                self.try_exit(id)
            }
        }
    }

    /// Put the robot back on its remembered cells.
    fn try_exit(&mut self, id: EntityId) -> Result<StepOutcome, SimError> {
        let threshold = self.config.stuck_threshold;
        let w = self.operators.get_mut(id).ok_or(SimError::UnknownEntity)?;
        let machine = w.machine;
        let Some(vacated) = w.vacated else {
            w.machine = None;
            self.set_operator_state(id, OperatorState::Returning);
            return Ok(StepOutcome::Continue);
        };
        if self.grid.place(id, vacated.anchor).is_err() {
            w.exit_blocked += 1;
            let blocked = w.exit_blocked;
            if threshold > 0 && blocked % threshold == 0 {
                self.report_stuck(id, blocked);
            }
            return Ok(StepOutcome::Continue);
        }
        w.vacated = None;
        w.exit_blocked = 0;
        w.machine = None;
        if let Some(m) = machine
            && self.presence(Some(m)) == OperatorPresence::Leaving(id)
        {
            self.set_presence(m, OperatorPresence::None);
        }
        self.set_operator_state(id, OperatorState::Returning);
        Ok(StepOutcome::Continue)
    }

    /// The machine stopped waiting for this robot before it got there.
    fn give_up_assignment(&mut self, id: EntityId) {
        if let Some(w) = self.operators.get_mut(id) {
            w.machine = None;
            w.nav.reset();
        }
        self.set_operator_state(id, OperatorState::Idle);
    }
}
