//! Scenario loading: file discovery, format detection, deserialization and
//! name resolution into registry ids.

use crate::schema::{AssignmentData, CatalogData, FleetData, OrderData};
use floorsim_core::fixed::f64_to_fixed64;
use floorsim_core::id::OrderId;
use floorsim_core::order::{Order, ProcessStep};
use floorsim_core::registry::{
    IntermediateStoreDef, MachineTypeDef, Registry, RegistryBuilder, RegistryError, RobotFleetDef,
    StartingConditions,
};
use floorsim_engine::EngineConfig;
use floorsim_spatial::{Assignment, GridPosition};
use log::debug;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The catalog parsed but does not describe a valid floor.
    #[error("invalid catalog {file}: {source}")]
    Invalid {
        file: PathBuf,
        #[source]
        source: RegistryError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file from its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Find `{base_name}.ron|toml|json` in `dir`. Two formats of the same base
/// name are an error.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML cannot hold a bare top-level array, so there
/// the list is read from the array under `toml_key`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Name resolution
// ===========================================================================

pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

pub fn check_duplicate<V>(map: &HashMap<String, V>, name: &str, file: &Path) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Scenario pipeline
// ===========================================================================

/// Everything a simulation is built from.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub registry: Registry,
    pub orders: Vec<Order>,
    pub assignments: Vec<Assignment>,
    /// From an optional `engine` file; defaults otherwise.
    pub engine: EngineConfig,
}

/// Load `catalog`, `orders` and the optional `layout` and `engine` files
/// from `dir`.
pub fn load_scenario(dir: &Path) -> Result<Scenario, DataLoadError> {
    let catalog_path = require_data_file(dir, "catalog")?;
    let catalog: CatalogData = deserialize_file(&catalog_path)?;
    let registry = build_registry(&catalog, &catalog_path)?;
    debug!("catalog loaded from {}", catalog_path.display());

    let orders_path = require_data_file(dir, "orders")?;
    let order_data: Vec<OrderData> = deserialize_list(&orders_path, "orders")?;
    let orders = resolve_orders(&registry, order_data, &orders_path)?;
    debug!("{} orders loaded from {}", orders.len(), orders_path.display());

    let assignments = match find_data_file(dir, "layout")? {
        Some(path) => {
            let data: Vec<AssignmentData> = deserialize_list(&path, "assignments")?;
            resolve_assignments(data, &path)?
        }
        None => Vec::new(),
    };

    let engine = match find_data_file(dir, "engine")? {
        Some(path) => deserialize_file(&path)?,
        None => EngineConfig::default(),
    };

    Ok(Scenario {
        registry,
        orders,
        assignments,
        engine,
    })
}

fn fleet(data: Option<&FleetData>, base: RobotFleetDef) -> RobotFleetDef {
    let Some(data) = data else {
        return base;
    };
    RobotFleetDef {
        count: data.count,
        size: data.size.map_or(base.size, Into::into),
        ticks_per_cell: data.ticks_per_cell.unwrap_or(base.ticks_per_cell),
        transfer_ticks_per_unit: data
            .transfer_ticks_per_unit
            .unwrap_or(base.transfer_ticks_per_unit),
        capacity: data.capacity.unwrap_or(base.capacity),
    }
}

/// Resolve machine-type names in product routings and build the registry.
pub fn build_registry(catalog: &CatalogData, file: &Path) -> Result<Registry, DataLoadError> {
    let mut builder = RegistryBuilder::new();
    builder.set_starting_conditions(StartingConditions {
        grid_width: catalog.starting.grid_width,
        grid_height: catalog.starting.grid_height,
        duration: catalog.starting.duration,
        day_length: catalog.starting.day_length,
    });

    let mut machine_types = HashMap::new();
    for mt in &catalog.machine_types {
        check_duplicate(&machine_types, &mt.name, file)?;
        let id = builder.register_machine_type(MachineTypeDef {
            name: mt.name.clone(),
            size: mt.size.into(),
            working_speed: f64_to_fixed64(mt.working_speed),
            capacity_before: mt.capacity_before,
            capacity_after: mt.capacity_after,
            setup_time: mt.setup_time,
            count: mt.count,
            old_count: mt.old_count,
        });
        machine_types.insert(mt.name.clone(), id);
    }

    let mut products = HashMap::new();
    for product in &catalog.products {
        check_duplicate(&products, &product.name, file)?;
        let steps = product
            .steps
            .iter()
            .map(|s| {
                Ok(ProcessStep {
                    machine_type: *resolve_name(&machine_types, &s.machine_type, file, "machine type")?,
                    processing_time: s.processing_time,
                })
            })
            .collect::<Result<Vec<_>, DataLoadError>>()?;
        let id = builder.register_product(&product.name, steps);
        products.insert(product.name.clone(), id);
    }

    builder.set_transport_fleet(fleet(catalog.transport_robots.as_ref(), RobotFleetDef::default()));
    builder.set_operator_fleet(fleet(
        catalog.operator_robots.as_ref(),
        RobotFleetDef {
            capacity: 0,
            ..RobotFleetDef::default()
        },
    ));
    if let Some(stores) = &catalog.intermediate_stores {
        builder.set_intermediate_stores(IntermediateStoreDef {
            count: stores.count,
            size: stores.size.into(),
            capacity: stores.capacity,
        });
    }
    if let Some(size) = catalog.source_size {
        builder.set_source_size(size.into());
    }
    if let Some(size) = catalog.sink_size {
        builder.set_sink_size(size.into());
    }

    builder.build().map_err(|source| DataLoadError::Invalid {
        file: file.to_path_buf(),
        source,
    })
}

/// Resolve product names. Daily sequence defaults to the position in the
/// file.
pub fn resolve_orders(
    registry: &Registry,
    data: Vec<OrderData>,
    file: &Path,
) -> Result<Vec<Order>, DataLoadError> {
    let mut seen: HashMap<String, ()> = HashMap::new();
    let mut orders = Vec::with_capacity(data.len());
    for (i, o) in data.into_iter().enumerate() {
        let key = o.id.to_string();
        check_duplicate(&seen, &key, file)?;
        seen.insert(key, ());
        let product = registry
            .product_id(&o.product)
            .ok_or_else(|| DataLoadError::UnresolvedRef {
                file: file.to_path_buf(),
                name: o.product.clone(),
                expected_kind: "product",
            })?;
        orders.push(Order {
            id: OrderId(o.id),
            product,
            quantity: o.quantity,
            order_date: o.order_date,
            priority: o.priority,
            daily_sequence: o.daily_sequence.unwrap_or(i as u32),
        });
    }
    Ok(orders)
}

/// Parse `"x:y"` cell ids. Entity names are checked later, against the
/// entities the engine creates.
pub fn resolve_assignments(
    data: Vec<AssignmentData>,
    file: &Path,
) -> Result<Vec<Assignment>, DataLoadError> {
    data.into_iter()
        .map(|a| {
            let cell: GridPosition = a
                .cell
                .parse()
                .map_err(|e| parse_error(file, format!("cell '{}' for {}: {e}", a.cell, a.entity)))?;
            Ok(Assignment {
                cell,
                name: a.entity,
            })
        })
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================
