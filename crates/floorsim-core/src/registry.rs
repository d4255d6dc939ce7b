//! The catalog: machine types, robot fleets, stations, product routings and
//! starting conditions. Built once through [`RegistryBuilder`] and frozen
//! before the first tick.

use crate::error::CoreError;
use crate::fixed::{Fixed64, Ticks};
use crate::id::*;
use crate::material::{MAX_STEPS, ProductionMaterial};
use crate::order::ProcessStep;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Footprint size in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const UNIT: Size = Size {
        width: 1,
        height: 1,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MachineTypeDef {
    pub name: String,
    pub size: Size,
    pub working_speed: Fixed64,
    pub capacity_before: u32,
    pub capacity_after: u32,
    /// Setup time paid whenever the material changes.
    pub setup_time: Ticks,
    /// Machines of this type on the floor.
    pub count: u32,
    /// How many of `count` are old (slower in queue estimates).
    pub old_count: u32,
}

/// A fleet of identical mobile robots.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotFleetDef {
    pub count: u32,
    pub size: Size,
    /// Ticks spent per cell moved.
    pub ticks_per_cell: Ticks,
    /// Ticks spent per unit loaded or unloaded.
    pub transfer_ticks_per_unit: Ticks,
    /// Units carried at once. Unused for operator robots.
    pub capacity: u32,
}

impl Default for RobotFleetDef {
    fn default() -> Self {
        Self {
            count: 1,
            size: Size::UNIT,
            ticks_per_cell: 1,
            transfer_ticks_per_unit: 1,
            capacity: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateStoreDef {
    pub count: u32,
    pub size: Size,
    pub capacity: u32,
}

impl Default for IntermediateStoreDef {
    fn default() -> Self {
        Self {
            count: 0,
            size: Size::UNIT,
            capacity: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartingConditions {
    pub grid_width: u32,
    pub grid_height: u32,
    /// Simulated run length.
    pub duration: Ticks,
    /// Length of one working day.
    pub day_length: Ticks,
}

impl Default for StartingConditions {
    fn default() -> Self {
        Self {
            grid_width: 30,
            grid_height: 20,
            duration: 10_000,
            day_length: 1_440,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDef {
    pub name: String,
    pub steps: Vec<ProcessStep>,
}

impl ProductDef {
    pub fn step_count(&self) -> u8 {
        self.steps.len() as u8
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    machine_types: Vec<MachineTypeDef>,
    machine_name_to_id: HashMap<String, MachineTypeId>,
    products: Vec<ProductDef>,
    product_name_to_id: HashMap<String, ProductId>,
    transport_fleet: RobotFleetDef,
    operator_fleet: RobotFleetDef,
    source_size: Option<Size>,
    sink_size: Option<Size>,
    intermediate_stores: IntermediateStoreDef,
    starting: StartingConditions,
    duplicates: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            operator_fleet: RobotFleetDef {
                capacity: 0,
                ..RobotFleetDef::default()
            },
            ..Self::default()
        }
    }

    pub fn register_machine_type(&mut self, def: MachineTypeDef) -> MachineTypeId {
        let id = MachineTypeId(self.machine_types.len() as u32);
        if self.machine_name_to_id.insert(def.name.clone(), id).is_some() {
            self.duplicates.push(def.name.clone());
        }
        self.machine_types.push(def);
        id
    }

    pub fn register_product(&mut self, name: &str, steps: Vec<ProcessStep>) -> ProductId {
        let id = ProductId(self.products.len() as u32);
        if self.product_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(name.to_string());
        }
        self.products.push(ProductDef {
            name: name.to_string(),
            steps,
        });
        id
    }

    pub fn set_transport_fleet(&mut self, fleet: RobotFleetDef) -> &mut Self {
        self.transport_fleet = fleet;
        self
    }

    pub fn set_operator_fleet(&mut self, fleet: RobotFleetDef) -> &mut Self {
        self.operator_fleet = fleet;
        self
    }

    pub fn set_source_size(&mut self, size: Size) -> &mut Self {
        self.source_size = Some(size);
        self
    }

    pub fn set_sink_size(&mut self, size: Size) -> &mut Self {
        self.sink_size = Some(size);
        self
    }

    pub fn set_intermediate_stores(&mut self, def: IntermediateStoreDef) -> &mut Self {
        self.intermediate_stores = def;
        self
    }

    pub fn set_starting_conditions(&mut self, starting: StartingConditions) -> &mut Self {
        self.starting = starting;
        self
    }

    pub fn machine_type_id(&self, name: &str) -> Option<MachineTypeId> {
        self.machine_name_to_id.get(name).copied()
    }

    pub fn product_id(&self, name: &str) -> Option<ProductId> {
        self.product_name_to_id.get(name).copied()
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<Registry, RegistryError> {
        if let Some(name) = self.duplicates.first() {
            return Err(RegistryError::DuplicateName(name.clone()));
        }
        if self.starting.grid_width == 0 || self.starting.grid_height == 0 {
            return Err(RegistryError::EmptyGrid);
        }
        for def in &self.machine_types {
            if def.size.is_empty() {
                return Err(RegistryError::ZeroSize(def.name.clone()));
            }
            if def.working_speed <= Fixed64::ZERO {
                return Err(RegistryError::NonPositiveSpeed(def.name.clone()));
            }
            if def.old_count > def.count {
                return Err(RegistryError::TooManyOld(def.name.clone()));
            }
        }
        for (label, size) in [
            ("transport robot", self.transport_fleet.size),
            ("operator robot", self.operator_fleet.size),
            ("intermediate store", self.intermediate_stores.size),
        ] {
            if size.is_empty() {
                return Err(RegistryError::ZeroSize(label.to_string()));
            }
        }
        for product in &self.products {
            let n = product.steps.len();
            if n == 0 || n > MAX_STEPS as usize {
                return Err(RegistryError::InvalidStepCount {
                    product: product.name.clone(),
                    steps: n,
                });
            }
            for step in &product.steps {
                if step.machine_type.0 as usize >= self.machine_types.len() {
                    return Err(RegistryError::InvalidMachineTypeRef {
                        product: product.name.clone(),
                        machine_type: step.machine_type,
                    });
                }
            }
        }

        Ok(Registry {
            machine_types: self.machine_types,
            machine_name_to_id: self.machine_name_to_id,
            products: self.products,
            product_name_to_id: self.product_name_to_id,
            transport_fleet: self.transport_fleet,
            operator_fleet: self.operator_fleet,
            source_size: self.source_size.unwrap_or(Size::UNIT),
            sink_size: self.sink_size.unwrap_or(Size::UNIT),
            intermediate_stores: self.intermediate_stores,
            starting: self.starting,
        })
    }
}

// ---------------------------------------------------------------------------
// Frozen registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Registry {
    machine_types: Vec<MachineTypeDef>,
    machine_name_to_id: HashMap<String, MachineTypeId>,
    products: Vec<ProductDef>,
    product_name_to_id: HashMap<String, ProductId>,
    transport_fleet: RobotFleetDef,
    operator_fleet: RobotFleetDef,
    source_size: Size,
    sink_size: Size,
    intermediate_stores: IntermediateStoreDef,
    starting: StartingConditions,
}

impl Registry {
    pub fn machine_type(&self, id: MachineTypeId) -> Result<&MachineTypeDef, CoreError> {
        self.machine_types
            .get(id.0 as usize)
            .ok_or(CoreError::UnknownMachineType(id))
    }

    /// All machine types in id order.
    pub fn machine_types(&self) -> impl Iterator<Item = (MachineTypeId, &MachineTypeDef)> {
        self.machine_types
            .iter()
            .enumerate()
            .map(|(i, d)| (MachineTypeId(i as u32), d))
    }

    pub fn machine_type_id(&self, name: &str) -> Option<MachineTypeId> {
        self.machine_name_to_id.get(name).copied()
    }

    pub fn product(&self, id: ProductId) -> Result<&ProductDef, CoreError> {
        self.products
            .get(id.0 as usize)
            .ok_or(CoreError::UnknownProduct(id))
    }

    pub fn products(&self) -> impl Iterator<Item = (ProductId, &ProductDef)> {
        self.products
            .iter()
            .enumerate()
            .map(|(i, d)| (ProductId(i as u32), d))
    }

    pub fn product_id(&self, name: &str) -> Option<ProductId> {
        self.product_name_to_id.get(name).copied()
    }

    /// Routing step `step` (1-based) of a product.
    pub fn step(&self, product: ProductId, step: u8) -> Result<&ProcessStep, CoreError> {
        let def = self.product(product)?;
        step.checked_sub(1)
            .and_then(|i| def.steps.get(i as usize))
            .ok_or(CoreError::InvalidMaterial {
                product,
                step,
                reason: crate::error::MaterialFault::StepBeyondRouting {
                    steps: def.step_count(),
                },
            })
    }

    /// The material a product has after `step` steps.
    pub fn material(&self, product: ProductId, step: u8) -> Result<ProductionMaterial, CoreError> {
        let steps = self.product(product)?.step_count();
        ProductionMaterial::at_step(product, step, steps)
    }

    pub fn raw_material(&self, product: ProductId) -> Result<ProductionMaterial, CoreError> {
        self.material(product, 0)
    }

    /// Human-readable `"Group.step"` label.
    pub fn material_label(&self, material: &ProductionMaterial) -> String {
        match self.product(material.product()) {
            Ok(def) => format!("{}.{}", def.name, material.step()),
            Err(_) => material.to_string(),
        }
    }

    /// Parse a `"Group.step"` label back into a material.
    pub fn parse_material(&self, label: &str) -> Result<ProductionMaterial, CoreError> {
        let malformed = || CoreError::MalformedMaterialName(label.to_string());
        let (group, step) = label.rsplit_once('.').ok_or_else(malformed)?;
        let step: u8 = step.parse().map_err(|_| malformed())?;
        let product = self.product_id(group).ok_or_else(malformed)?;
        self.material(product, step)
    }

    pub fn transport_fleet(&self) -> &RobotFleetDef {
        &self.transport_fleet
    }

    pub fn operator_fleet(&self) -> &RobotFleetDef {
        &self.operator_fleet
    }

    pub fn source_size(&self) -> Size {
        self.source_size
    }

    pub fn sink_size(&self) -> Size {
        self.sink_size
    }

    pub fn intermediate_stores(&self) -> &IntermediateStoreDef {
        &self.intermediate_stores
    }

    pub fn starting_conditions(&self) -> &StartingConditions {
        &self.starting
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("name registered twice: {0}")]
    DuplicateName(String),
    #[error("grid must have at least one cell")]
    EmptyGrid,
    #[error("{0} has a zero-sized footprint")]
    ZeroSize(String),
    #[error("machine type {0} has a non-positive working speed")]
    NonPositiveSpeed(String),
    #[error("machine type {0} has more old machines than machines")]
    TooManyOld(String),
    #[error("product {product} has {steps} steps, expected 1 to 4")]
    InvalidStepCount { product: String, steps: usize },
    #[error("product {product} references unknown machine type {machine_type:?}")]
    InvalidMachineTypeRef {
        product: String,
        machine_type: MachineTypeId,
    },
}
