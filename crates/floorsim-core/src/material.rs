//! Production materials: a product group at a given process step.
//!
//! A material is consumed exactly once by a machine and replaced by its
//! successor ([`ProductionMaterial::advanced`]). The item type is derived
//! from the step suffix and the routing length, and every constructor checks
//! that the two agree.

use crate::error::{CoreError, MaterialFault};
use crate::id::ProductId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest supported product routing.
pub const MAX_STEPS: u8 = 4;

/// Processing level of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Raw,
    Intermediate1,
    Intermediate2,
    Packed,
}

impl ItemType {
    /// Item type of step `step` in a routing of `steps` steps.
    ///
    /// Step 0 is raw and the final step is packed. Step 1 of a longer
    /// routing is intermediate-1; any later non-final step is intermediate-2.
    pub fn for_step(step: u8, steps: u8) -> ItemType {
        if step == 0 {
            ItemType::Raw
        } else if step >= steps {
            ItemType::Packed
        } else if step == 1 {
            ItemType::Intermediate1
        } else {
            ItemType::Intermediate2
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductionMaterial {
    product: ProductId,
    step: u8,
    steps: u8,
    item_type: ItemType,
}

impl ProductionMaterial {
    /// Build a material and check it against the item-type rule.
    pub fn new(
        product: ProductId,
        step: u8,
        steps: u8,
        item_type: ItemType,
    ) -> Result<Self, CoreError> {
        let fault = |reason| CoreError::InvalidMaterial {
            product,
            step,
            reason,
        };
        if steps == 0 || steps > MAX_STEPS {
            return Err(fault(MaterialFault::StepCount(steps)));
        }
        if step > steps {
            return Err(fault(MaterialFault::StepBeyondRouting { steps }));
        }
        let expected = ItemType::for_step(step, steps);
        if expected != item_type {
            return Err(fault(MaterialFault::ItemType {
                expected,
                found: item_type,
            }));
        }
        Ok(Self {
            product,
            step,
            steps,
            item_type,
        })
    }

    /// Material at `step` with the item type the rule prescribes.
    pub fn at_step(product: ProductId, step: u8, steps: u8) -> Result<Self, CoreError> {
        Self::new(product, step, steps, ItemType::for_step(step, steps))
    }

    /// Unprocessed material of a product, as released by the Source.
    pub fn raw(product: ProductId, steps: u8) -> Result<Self, CoreError> {
        Self::new(product, 0, steps, ItemType::Raw)
    }

    /// The successor produced when a machine finishes this material's next
    /// step.
    pub fn advanced(&self) -> Result<Self, CoreError> {
        if self.is_packed() {
            return Err(CoreError::InvalidMaterial {
                product: self.product,
                step: self.step,
                reason: MaterialFault::AlreadyPacked,
            });
        }
        Self::at_step(self.product, self.step + 1, self.steps)
    }

    pub fn product(&self) -> ProductId {
        self.product
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    /// Length of the routing this material belongs to.
    pub fn steps(&self) -> u8 {
        self.steps
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn is_raw(&self) -> bool {
        self.item_type == ItemType::Raw
    }

    pub fn is_packed(&self) -> bool {
        self.item_type == ItemType::Packed
    }
}

impl fmt::Display for ProductionMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.product, self.step)
    }
}
