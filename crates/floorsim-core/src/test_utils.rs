//! Catalog builders shared by unit and integration tests.

use crate::fixed::{Fixed64, Ticks};
use crate::id::{MachineTypeId, OrderId, ProductId};
use crate::order::{Order, ProcessStep};
use crate::registry::{MachineTypeDef, RegistryBuilder, Size, StartingConditions};

/// A 1x1 machine type with unit speed and no setup time.
pub fn machine_def(name: &str, capacity: u32) -> MachineTypeDef {
    MachineTypeDef {
        name: name.to_string(),
        size: Size::UNIT,
        working_speed: Fixed64::ONE,
        capacity_before: capacity,
        capacity_after: capacity,
        setup_time: 0,
        count: 1,
        old_count: 0,
    }
}

pub fn step(machine_type: MachineTypeId, processing_time: Ticks) -> ProcessStep {
    ProcessStep {
        machine_type,
        processing_time,
    }
}

pub fn order(id: u32, product: ProductId, quantity: u32) -> Order {
    Order {
        id: OrderId(id),
        product,
        quantity,
        order_date: 0,
        priority: 1,
        daily_sequence: id,
    }
}

/// Builder preloaded with a small grid and one machine type `A`
/// (capacity 5/5) plus a one-step product `Widget` routed through it.
pub fn single_machine_builder() -> (RegistryBuilder, MachineTypeId, ProductId) {
    let mut b = RegistryBuilder::new();
    b.set_starting_conditions(StartingConditions {
        grid_width: 12,
        grid_height: 8,
        duration: 2_000,
        day_length: 1_000,
    });
    let a = b.register_machine_type(machine_def("A", 5));
    let p = b.register_product("Widget", vec![step(a, 3)]);
    (b, a, p)
}

/// Builder with machine types `A` and `B` and a two-step product
/// `Gadget` routed A then B.
pub fn two_step_builder() -> (RegistryBuilder, [MachineTypeId; 2], ProductId) {
    let mut b = RegistryBuilder::new();
    b.set_starting_conditions(StartingConditions {
        grid_width: 16,
        grid_height: 10,
        duration: 4_000,
        day_length: 1_000,
    });
    let a = b.register_machine_type(machine_def("A", 5));
    let m_b = b.register_machine_type(machine_def("B", 5));
    let p = b.register_product("Gadget", vec![step(a, 2), step(m_b, 3)]);
    (b, [a, m_b], p)
}
