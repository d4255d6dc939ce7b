//! Read-only views of the running simulation.
//!
//! Snapshots own their data so callers can keep or serialize them without
//! holding a borrow on the simulation.

use crate::engine::{FlowCounters, RunMode, Simulation};
use crate::machine::OperatorPresence;
use crate::transport::TransportOrder;
use floorsim_core::fixed::Ticks;
use floorsim_core::id::{EntityId, EntityKind};
use floorsim_core::order::{ProcessMaterial, ProcessingOrder};
use floorsim_core::status::{MachineState, OperatorState, TransportState};
use floorsim_core::store::MaterialStack;
use floorsim_spatial::GridPosition;
use serde::Serialize;
use std::fmt;

/// Who stands on a cell and what it is doing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupantSnapshot {
    pub entity: EntityId,
    pub kind: EntityKind,
    pub name: String,
    /// `None` for an operator inside a machine.
    pub anchor: Option<GridPosition>,
    pub status: EntityStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EntityStatus {
    Machine(MachineStatus),
    Transport {
        state: TransportState,
        order: Option<TransportOrder>,
        cargo: Vec<MaterialStack>,
    },
    Operator {
        state: OperatorState,
        machine: Option<String>,
    },
    Station {
        stock: Vec<MaterialStack>,
        awaiting_input: bool,
        awaiting_pickup: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineStatus {
    pub state: MachineState,
    pub operator: OperatorPresence,
    pub processing: Vec<ProcessingOrder>,
    pub materials: Vec<ProcessMaterial>,
    pub input: Vec<MaterialStack>,
    pub output: Vec<MaterialStack>,
    pub awaiting_input: bool,
    pub awaiting_pickup: bool,
    pub units_produced: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineSummary {
    pub name: String,
    pub state: MachineState,
    pub queued: usize,
    pub units_produced: u64,
    pub utilization: f64,
}

/// Throughput and utilization at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub tick: Ticks,
    pub run_mode: RunMode,
    pub orders_waiting: usize,
    pub orders_open: usize,
    pub orders_completed: usize,
    pub flow: FlowCounters,
    pub pending_requests: usize,
    pub machines: Vec<MachineSummary>,
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "tick {} ({:?}): orders {} waiting / {} open / {} completed, units {} released / {} delivered, {} requests pending",
            self.tick,
            self.run_mode,
            self.orders_waiting,
            self.orders_open,
            self.orders_completed,
            self.flow.released,
            self.flow.delivered,
            self.pending_requests
        )?;
        for m in &self.machines {
            writeln!(
                f,
                "  {:<12} {:<18} queued {:>3}  produced {:>5}  utilization {:>5.1}%",
                m.name,
                format!("{:?}", m.state),
                m.queued,
                m.units_produced,
                m.utilization * 100.0
            )?;
        }
        Ok(())
    }
}

impl Simulation {
    /// The entity covering `pos`, if any. An operator working inside a
    /// machine is reported through the machine's status.
    pub fn occupant_at(&self, pos: GridPosition) -> Option<OccupantSnapshot> {
        self.grid.occupant(pos).and_then(|id| self.snapshot_of(id))
    }

    pub fn snapshot_of(&self, id: EntityId) -> Option<OccupantSnapshot> {
        let kind = self.kind_of(id)?;
        let status = match kind {
            EntityKind::Machine => {
                let m = self.machines.get(id)?;
                EntityStatus::Machine(MachineStatus {
                    state: m.state,
                    operator: m.operator,
                    processing: m.processing.clone(),
                    materials: m.materials.clone(),
                    input: m.input.stacks().to_vec(),
                    output: m.output.stacks().to_vec(),
                    awaiting_input: m.awaiting_input,
                    awaiting_pickup: m.awaiting_pickup,
                    units_produced: m.stats.units_produced,
                })
            }
            EntityKind::TransportRobot => {
                let t = self.transports.get(id)?;
                EntityStatus::Transport {
                    state: t.state,
                    order: t.order.clone(),
                    cargo: t.cargo.stacks().to_vec(),
                }
            }
            EntityKind::WorkingRobot => {
                let w = self.operators.get(id)?;
                EntityStatus::Operator {
                    state: w.state,
                    machine: w.machine.map(|m| self.name_of(m).to_string()),
                }
            }
            EntityKind::Source | EntityKind::Sink | EntityKind::IntermediateStore => {
                let s = self.stations.get(id)?;
                EntityStatus::Station {
                    stock: s.store.stacks().to_vec(),
                    awaiting_input: s.awaiting_input,
                    awaiting_pickup: s.awaiting_pickup,
                }
            }
        };
        Some(OccupantSnapshot {
            entity: id,
            kind,
            name: self.name_of(id).to_string(),
            anchor: self.grid.anchor(id),
            status,
        })
    }

    pub fn summary(&self) -> SimulationSummary {
        let machines = self
            .machine_ids
            .iter()
            .filter_map(|&id| {
                let m = self.machines.get(id)?;
                Some(MachineSummary {
                    name: self.name_of(id).to_string(),
                    state: m.state,
                    queued: m.processing.len(),
                    units_produced: m.stats.units_produced,
                    utilization: m.stats.utilization(),
                })
            })
            .collect();
        SimulationSummary {
            tick: self.tick,
            run_mode: self.run_mode,
            orders_waiting: self.backlog.len(),
            orders_open: self.active_orders.len(),
            orders_completed: self.completed_orders.len(),
            flow: self.flow,
            pending_requests: self.pending_requests.len(),
            machines,
        }
    }
}
