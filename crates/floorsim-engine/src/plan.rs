//! Manufacturing plan: queue estimates, load balancing between machines of
//! one type, and processing-list ordering.

use crate::engine::Simulation;
use crate::error::SimError;
use crate::machine::Machine;
use floorsim_core::error::CoreError;
use floorsim_core::fixed::{Fixed64, Ticks, per_unit_ticks, ticks_to_fixed};
use floorsim_core::id::EntityId;
use floorsim_core::order::{ProcessMaterial, ProcessingOrder};
use floorsim_core::registry::Registry;
use log::debug;
use std::cmp::Reverse;

/// Estimated ticks until `machine` has worked off its processing list.
///
/// Sums `remaining units * per-unit time` plus the setup time wherever the
/// produced material changes along the list; old machines pay 20% on top.
/// Always recomputed from the live list.
pub fn queue_length(machine: &Machine, registry: &Registry) -> Result<Fixed64, CoreError> {
    let mut total = Fixed64::ZERO;
    let mut current = machine.set_up_for;
    for (order, pm) in machine.processing.iter().zip(&machine.materials) {
        let step = registry.step(order.product, order.step)?;
        let per_unit = per_unit_ticks(step.processing_time, machine.speed);
        let work: Ticks = u64::from(pm.qty_producing) * per_unit;
        total = total.saturating_add(ticks_to_fixed(work));
        if current != Some(pm.producing) {
            total = total.saturating_add(ticks_to_fixed(machine.setup_time));
            current = Some(pm.producing);
        }
    }
    if machine.is_old() {
        total = total.saturating_add(total / 5);
    }
    Ok(total)
}

/// The candidate with the shortest queue; ties go to the first listed.
pub fn pick_machine(candidates: &[(EntityId, Fixed64)]) -> Option<EntityId> {
    let mut best: Option<(EntityId, Fixed64)> = None;
    for &(id, len) in candidates {
        match best {
            Some((_, best_len)) if len >= best_len => {}
            _ => best = Some((id, len)),
        }
    }
    best.map(|(id, _)| id)
}

/// Order the processing list by (material the machine is set up for first,
/// priority ascending, step descending). The head is kept in place while
/// [`Machine::head_pinned`] holds. The process-material list moves in
/// lock-step.
pub fn sort_processing_list(machine: &mut Machine) {
    let pinned = usize::from(machine.head_pinned() && !machine.processing.is_empty());
    let set_up_for = machine.set_up_for;
    let mut tail: Vec<(ProcessingOrder, ProcessMaterial)> = machine
        .processing
        .drain(pinned..)
        .zip(machine.materials.drain(pinned..))
        .collect();
    tail.sort_by_key(|(order, pm)| {
        (
            set_up_for != Some(pm.producing),
            order.priority,
            Reverse(order.step),
        )
    });
    for (order, pm) in tail {
        machine.processing.push(order);
        machine.materials.push(pm);
    }
}

impl Simulation {
    /// Queue `order` on the least-loaded machine of the type its step
    /// needs. The chosen machine is woken at `wake_at`.
    pub(crate) fn enqueue_step(
        &mut self,
        order: ProcessingOrder,
        material: ProcessMaterial,
        wake_at: Ticks,
    ) -> Result<EntityId, SimError> {
        let machine_type = self.registry.step(order.product, order.step)?.machine_type;
        let mut candidates = Vec::new();
        for &id in &self.machine_ids {
            if let Some(m) = self.machines.get(id)
                && m.machine_type == machine_type
            {
                candidates.push((id, queue_length(m, &self.registry)?));
            }
        }
        let chosen = pick_machine(&candidates).ok_or(SimError::NoMachineOfType(machine_type))?;
        if let Some(m) = self.machines.get_mut(chosen) {
            m.enqueue(order, material);
        }
        debug!(
            "{} step {} of {} queued on {}",
            order.product,
            order.step,
            order.order,
            self.name_of(chosen)
        );
        self.scheduler.wake(chosen, wake_at);
        Ok(chosen)
    }
}
