use crate::id::{MachineTypeId, ProductId};
use crate::material::ItemType;
use thiserror::Error;

/// Errors raised by core data types and catalog lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid material {product}.{step}: {reason}")]
    InvalidMaterial {
        product: ProductId,
        step: u8,
        reason: MaterialFault,
    },
    #[error("unknown product {0}")]
    UnknownProduct(ProductId),
    #[error("unknown machine type {0:?}")]
    UnknownMachineType(MachineTypeId),
    #[error("malformed material name `{0}`")]
    MalformedMaterialName(String),
    #[error("production quantity underflow for {product}.{step}")]
    QuantityUnderflow { product: ProductId, step: u8 },
}

/// Why a material failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialFault {
    /// The product routing must have between 1 and 4 steps.
    StepCount(u8),
    /// Step suffix is larger than the routing length.
    StepBeyondRouting { steps: u8 },
    /// Item type disagrees with the step suffix.
    ItemType { expected: ItemType, found: ItemType },
    /// A packed material has no successor.
    AlreadyPacked,
}

impl std::fmt::Display for MaterialFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterialFault::StepCount(n) => write!(f, "routing has {n} steps"),
            MaterialFault::StepBeyondRouting { steps } => {
                write!(f, "step exceeds routing length {steps}")
            }
            MaterialFault::ItemType { expected, found } => {
                write!(f, "item type {found:?}, expected {expected:?}")
            }
            MaterialFault::AlreadyPacked => write!(f, "already packed"),
        }
    }
}
