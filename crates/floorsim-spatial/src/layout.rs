//! Initial placement of stations and robots.
//!
//! An external assignment of `(cell_id, name)` pairs is applied first; bad
//! entries are logged and skipped, never fatal. Every entity left over is
//! placed by the default layout:
//!
//! - sources on the west edge and sinks on the east edge, centred
//!   vertically;
//! - machines, then intermediate stores, packed in rows from the north-west
//!   with aisles between them;
//! - robot homes along the south edge.

use crate::{FloorGrid, GridPosition, SpatialError};
use floorsim_core::id::{EntityId, EntityKind};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// An entity the layout must place. Its size is taken from the grid.
#[derive(Debug, Clone)]
pub struct LayoutEntry {
    pub entity: EntityId,
    pub kind: EntityKind,
    pub name: String,
}

/// One externally chosen position: the named entity's anchor cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub cell: GridPosition,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("no entity with that name")]
    UnknownEntity,
    #[error("cell already assigned")]
    DuplicatePosition,
    #[error("entity already assigned")]
    AlreadyAssigned,
    #[error("{0}")]
    Blocked(SpatialError),
}

#[derive(Debug, Default)]
pub struct LayoutReport {
    pub assigned: Vec<EntityId>,
    pub defaulted: Vec<EntityId>,
    pub rejected: Vec<(Assignment, RejectReason)>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("no room left on the floor for {name}")]
    NoRoom { name: String },
    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

/// Place every entry, honouring `assignments` where possible.
///
/// `aisle` is the corridor width kept between stations; it is clamped to at
/// least one cell.
pub fn apply_layout(
    grid: &mut FloorGrid,
    entries: &[LayoutEntry],
    assignments: &[Assignment],
    aisle: u32,
) -> Result<LayoutReport, LayoutError> {
    let mut report = LayoutReport::default();
    let by_name: HashMap<&str, &LayoutEntry> =
        entries.iter().map(|e| (e.name.as_str(), e)).collect();
    let mut used_cells = BTreeSet::new();

    for a in assignments {
        let outcome = match by_name.get(a.name.as_str()) {
            None => Err(RejectReason::UnknownEntity),
            Some(_) if used_cells.contains(&a.cell) => Err(RejectReason::DuplicatePosition),
            Some(e) if report.assigned.contains(&e.entity) => Err(RejectReason::AlreadyAssigned),
            Some(e) => grid
                .place(e.entity, a.cell)
                .map(|_| e.entity)
                .map_err(RejectReason::Blocked),
        };
        match outcome {
            Ok(entity) => {
                used_cells.insert(a.cell);
                debug!("layout: {} assigned to {}", a.name, a.cell);
                report.assigned.push(entity);
            }
            Err(reason) => {
                warn!("layout: rejected {} at {}: {}", a.name, a.cell, reason);
                report.rejected.push((a.clone(), reason));
            }
        }
    }

    let pending: Vec<&LayoutEntry> = entries
        .iter()
        .filter(|e| !grid.is_placed(e.entity))
        .collect();
    let mut placer = DefaultPlacer::new(grid, entries, aisle.max(1));
    for kind in [
        EntityKind::Source,
        EntityKind::Sink,
        EntityKind::Machine,
        EntityKind::IntermediateStore,
        EntityKind::TransportRobot,
        EntityKind::WorkingRobot,
    ] {
        for entry in pending.iter().filter(|e| e.kind == kind) {
            placer.place(grid, entry)?;
            report.defaulted.push(entry.entity);
        }
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Default layout
// ---------------------------------------------------------------------------

/// Cursor state for the shelf packing of machines and stores.
struct DefaultPlacer {
    aisle: i32,
    left: i32,
    right: i32,
    bottom: i32,
    cursor_x: i32,
    cursor_y: i32,
    row_height: i32,
}

impl DefaultPlacer {
    fn new(grid: &FloorGrid, entries: &[LayoutEntry], aisle: u32) -> Self {
        let widest = |kind: EntityKind| {
            entries
                .iter()
                .filter(|e| e.kind == kind)
                .filter_map(|e| grid.size_of(e.entity))
                .map(|s| s.width as i32)
                .max()
                .unwrap_or(0)
        };
        let robot_height = entries
            .iter()
            .filter(|e| e.kind.is_robot())
            .filter_map(|e| grid.size_of(e.entity))
            .map(|s| s.height as i32)
            .max()
            .unwrap_or(0);
        let aisle = aisle as i32;
        let left = widest(EntityKind::Source) + aisle;
        Self {
            aisle,
            left,
            right: grid.width() as i32 - widest(EntityKind::Sink) - aisle,
            bottom: robot_height + aisle,
            cursor_x: left,
            cursor_y: grid.height() as i32 - 1 - aisle,
            row_height: 0,
        }
    }

    fn place(&mut self, grid: &mut FloorGrid, entry: &LayoutEntry) -> Result<(), LayoutError> {
        let grid_width = grid.width() as i32;
        let placed = match entry.kind {
            EntityKind::Source => Self::on_edge(grid, entry.entity, |_| 0),
            EntityKind::Sink => Self::on_edge(grid, entry.entity, |w| grid_width - w),
            EntityKind::Machine | EntityKind::IntermediateStore => self.on_shelf(grid, entry.entity),
            EntityKind::TransportRobot | EntityKind::WorkingRobot => {
                Self::scan(grid, entry.entity, self.left)
            }
        }?;
        match placed {
            Some(anchor) => {
                debug!("layout: {} placed at {}", entry.name, anchor);
                Ok(())
            }
            None => Err(LayoutError::NoRoom {
                name: entry.name.clone(),
            }),
        }
    }

    /// Anchor column from `x_of(width)`, rows tried from the middle outwards.
    fn on_edge(
        grid: &mut FloorGrid,
        entity: EntityId,
        x_of: impl Fn(i32) -> i32,
    ) -> Result<Option<GridPosition>, LayoutError> {
        let size = grid.size_of(entity).ok_or(SpatialError::NotRegistered)?;
        let x = x_of(size.width as i32);
        let height = grid.height() as i32;
        let mid = height / 2;
        for off in 0..height {
            for y in [mid + off, mid - off - 1] {
                if !(size.height as i32 - 1..height).contains(&y) {
                    continue;
                }
                let anchor = GridPosition::new(x, y);
                if grid.place(entity, anchor).is_ok() {
                    return Ok(Some(anchor));
                }
            }
        }
        Ok(None)
    }

    fn on_shelf(&mut self, grid: &mut FloorGrid, entity: EntityId) -> Result<Option<GridPosition>, LayoutError> {
        let size = grid.size_of(entity).ok_or(SpatialError::NotRegistered)?;
        let (w, h) = (size.width as i32, size.height as i32);
        if w > self.right - self.left {
            return Ok(None);
        }
        loop {
            if self.cursor_x + w > self.right {
                self.cursor_y -= self.row_height.max(1) + self.aisle;
                self.cursor_x = self.left;
                self.row_height = 0;
            }
            if self.cursor_y - h + 1 < self.bottom {
                return Ok(None);
            }
            let anchor = GridPosition::new(self.cursor_x, self.cursor_y);
            if grid.place(entity, anchor).is_ok() {
                self.cursor_x += w + self.aisle;
                self.row_height = self.row_height.max(h);
                return Ok(Some(anchor));
            }
            self.cursor_x += 1;
        }
    }

    /// First free anchor scanning rows from the south edge, starting at
    /// column `from_x`.
    fn scan(grid: &mut FloorGrid, entity: EntityId, from_x: i32) -> Result<Option<GridPosition>, LayoutError> {
        let size = grid.size_of(entity).ok_or(SpatialError::NotRegistered)?;
        for y in size.height as i32 - 1..grid.height() as i32 {
            for x in from_x..grid.width() as i32 {
                let anchor = GridPosition::new(x, y);
                if grid.place(entity, anchor).is_ok() {
                    return Ok(Some(anchor));
                }
            }
        }
        Ok(None)
    }
}
