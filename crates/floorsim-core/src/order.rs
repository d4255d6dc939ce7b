//! Customer orders and the per-machine work items derived from them.

use crate::error::CoreError;
use crate::fixed::Ticks;
use crate::id::{MachineTypeId, OrderId, ProductId};
use crate::material::ProductionMaterial;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// One step of a product routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub machine_type: MachineTypeId,
    pub processing_time: Ticks,
}

/// A customer order for `quantity` packed units of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub product: ProductId,
    pub quantity: u32,
    /// Tick at which the order is released to the floor.
    pub order_date: Ticks,
    /// Lower is more urgent.
    pub priority: u8,
    /// Tie-break between orders of equal priority.
    pub daily_sequence: u32,
}

impl Order {
    /// The work item for step `step` (1-based) of this order.
    pub fn processing_order(&self, step: u8) -> ProcessingOrder {
        ProcessingOrder {
            order: self.id,
            product: self.product,
            step,
            priority: self.priority,
            daily_sequence: self.daily_sequence,
        }
    }
}

/// A single routing step of an order, queued at one machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessingOrder {
    pub order: OrderId,
    pub product: ProductId,
    /// 1-based routing step.
    pub step: u8,
    pub priority: u8,
    pub daily_sequence: u32,
}

impl ProcessingOrder {
    /// Dispatch order: priority ascending, step descending, then daily
    /// sequence ascending.
    pub fn dispatch_key(&self) -> (u8, Reverse<u8>, u32) {
        (self.priority, Reverse(self.step), self.daily_sequence)
    }

    /// The same order one routing step later.
    pub fn next_step(&self) -> ProcessingOrder {
        ProcessingOrder {
            step: self.step + 1,
            ..*self
        }
    }
}

/// Input and output bookkeeping for one [`ProcessingOrder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMaterial {
    pub required: ProductionMaterial,
    /// Input units not yet consumed.
    pub qty_required: u32,
    pub producing: ProductionMaterial,
    /// Output units not yet produced.
    pub qty_producing: u32,
    /// Set once the first unit of this run has started.
    pub started: bool,
}

impl ProcessMaterial {
    /// Work that turns `quantity` units of `required` into its successor.
    pub fn new(required: ProductionMaterial, quantity: u32) -> Result<Self, CoreError> {
        Ok(Self {
            required,
            qty_required: quantity,
            producing: required.advanced()?,
            qty_producing: quantity,
            started: false,
        })
    }

    /// Record that one input unit entered production.
    pub fn consume_input(&mut self) -> Result<(), CoreError> {
        self.qty_required = self.qty_required.checked_sub(1).ok_or_else(|| self.underflow())?;
        self.started = true;
        Ok(())
    }

    /// Record one finished unit. Returns `true` when the run is complete.
    pub fn complete_unit(&mut self) -> Result<bool, CoreError> {
        self.qty_producing = self.qty_producing.checked_sub(1).ok_or_else(|| self.underflow())?;
        Ok(self.qty_producing == 0)
    }

    pub fn is_finished(&self) -> bool {
        self.qty_producing == 0
    }

    fn underflow(&self) -> CoreError {
        CoreError::QuantityUnderflow {
            product: self.producing.product(),
            step: self.producing.step(),
        }
    }
}
