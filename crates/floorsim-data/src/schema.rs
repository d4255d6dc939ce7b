//! On-disk shapes of scenario files.
//!
//! Entities refer to each other by name here; the loader resolves names to
//! the registry's ids.

use floorsim_core::registry::Size;
use serde::Deserialize;

// ===========================================================================
// Catalog
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogData {
    pub starting: StartingData,
    pub machine_types: Vec<MachineTypeData>,
    pub products: Vec<ProductData>,
    #[serde(default)]
    pub transport_robots: Option<FleetData>,
    #[serde(default)]
    pub operator_robots: Option<FleetData>,
    #[serde(default)]
    pub intermediate_stores: Option<StoreData>,
    #[serde(default)]
    pub source_size: Option<SizeData>,
    #[serde(default)]
    pub sink_size: Option<SizeData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartingData {
    pub grid_width: u32,
    pub grid_height: u32,
    /// Run length in ticks.
    pub duration: u64,
    #[serde(default = "default_day_length")]
    pub day_length: u64,
}

fn default_day_length() -> u64 {
    1440
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SizeData {
    pub width: u32,
    pub height: u32,
}

impl Default for SizeData {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
        }
    }
}

impl From<SizeData> for Size {
    fn from(s: SizeData) -> Self {
        Size::new(s.width, s.height)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MachineTypeData {
    pub name: String,
    #[serde(default)]
    pub size: SizeData,
    /// Multiplier on processing speed; 1.0 is nominal.
    #[serde(default = "default_speed")]
    pub working_speed: f64,
    pub capacity_before: u32,
    pub capacity_after: u32,
    #[serde(default)]
    pub setup_time: u64,
    #[serde(default = "default_one")]
    pub count: u32,
    #[serde(default)]
    pub old_count: u32,
}

fn default_speed() -> f64 {
    1.0
}

fn default_one() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductData {
    pub name: String,
    pub steps: Vec<StepData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepData {
    pub machine_type: String,
    pub processing_time: u64,
}

/// Missing fields take the fleet defaults of the registry.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetData {
    pub count: u32,
    #[serde(default)]
    pub size: Option<SizeData>,
    #[serde(default)]
    pub ticks_per_cell: Option<u64>,
    #[serde(default)]
    pub transfer_ticks_per_unit: Option<u64>,
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreData {
    pub count: u32,
    #[serde(default)]
    pub size: SizeData,
    pub capacity: u32,
}

// ===========================================================================
// Orders
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct OrderData {
    pub id: u32,
    pub product: String,
    pub quantity: u32,
    #[serde(default)]
    pub order_date: u64,
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Defaults to the order's position in the file.
    #[serde(default)]
    pub daily_sequence: Option<u32>,
}

fn default_priority() -> u8 {
    1
}

// ===========================================================================
// Layout
// ===========================================================================

/// Anchor of one named entity; `cell` is a `"x:y"` cell id.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentData {
    pub cell: String,
    pub entity: String,
}
