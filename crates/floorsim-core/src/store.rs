//! Bounded material stores: machine buffers, intermediate stores, robot
//! cargo bays. Source and Sink use unbounded stores.

use crate::material::ProductionMaterial;
use serde::{Deserialize, Serialize};

/// Quantity of a single material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialStack {
    pub material: ProductionMaterial,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialStore {
    stacks: Vec<MaterialStack>,
    /// Unit capacity; `None` is unbounded.
    capacity: Option<u32>,
}

impl MaterialStore {
    pub fn new(capacity: u32) -> Self {
        Self {
            stacks: Vec::new(),
            capacity: Some(capacity),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            stacks: Vec::new(),
            capacity: None,
        }
    }

    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }

    /// Add units. Returns the amount that did not fit.
    #[must_use = "overflow count indicates units that did not fit"]
    pub fn add(&mut self, material: ProductionMaterial, quantity: u32) -> u32 {
        let to_add = quantity.min(self.free_capacity());
        if to_add > 0 {
            match self.stacks.iter_mut().find(|s| s.material == material) {
                Some(stack) => stack.quantity += to_add,
                None => self.stacks.push(MaterialStack {
                    material,
                    quantity: to_add,
                }),
            }
        }
        quantity - to_add
    }

    /// Remove units. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, material: ProductionMaterial, quantity: u32) -> u32 {
        let Some(pos) = self.stacks.iter().position(|s| s.material == material) else {
            return 0;
        };
        let taken = quantity.min(self.stacks[pos].quantity);
        self.stacks[pos].quantity -= taken;
        if self.stacks[pos].quantity == 0 {
            self.stacks.remove(pos);
        }
        taken
    }

    pub fn quantity(&self, material: ProductionMaterial) -> u32 {
        self.stacks
            .iter()
            .find(|s| s.material == material)
            .map_or(0, |s| s.quantity)
    }

    pub fn total(&self) -> u32 {
        self.stacks.iter().map(|s| s.quantity).sum()
    }

    pub fn free_capacity(&self) -> u32 {
        match self.capacity {
            Some(cap) => cap.saturating_sub(self.total()),
            None => u32::MAX - self.total(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some() && self.free_capacity() == 0
    }

    pub fn contains(&self, material: ProductionMaterial) -> bool {
        self.quantity(material) > 0
    }

    /// Whether the store holds anything other than `material`.
    pub fn holds_other_than(&self, material: ProductionMaterial) -> bool {
        self.stacks.iter().any(|s| s.material != material)
    }

    /// The oldest stack still present.
    pub fn first(&self) -> Option<&MaterialStack> {
        self.stacks.first()
    }

    pub fn stacks(&self) -> &[MaterialStack] {
        &self.stacks
    }
}
