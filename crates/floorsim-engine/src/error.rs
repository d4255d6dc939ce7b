use floorsim_core::error::CoreError;
use floorsim_core::id::MachineTypeId;
use floorsim_core::registry::RegistryError;
use floorsim_spatial::{LayoutError, SpatialError};
use thiserror::Error;

/// Fatal problems found before the first tick.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("product {product} needs machine type {machine_type}, but none is on the floor")]
    NoMachineOfType {
        product: String,
        machine_type: String,
    },
    #[error("invalid footprint for {name}: {source}")]
    InvalidFootprint {
        name: String,
        #[source]
        source: SpatialError,
    },
    #[error("layout failed: {0}")]
    Layout(#[from] LayoutError),
    #[error("catalog error: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Errors surfaced while the simulation runs.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown entity")]
    UnknownEntity,
    #[error("no machine of type {0:?} on the floor")]
    NoMachineOfType(MachineTypeId),
    #[error(transparent)]
    Spatial(#[from] SpatialError),
    #[error(transparent)]
    Core(#[from] CoreError),
}
