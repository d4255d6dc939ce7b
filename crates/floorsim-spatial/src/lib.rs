//! The shared floor grid: cell occupancy, entity footprints and movement.
//!
//! [`FloorGrid`] keeps a bidirectional mapping:
//! - `cells`: row-major cell array -> occupying entity
//! - `footprints`: entity -> the rectangle it covers
//!
//! `place`, `move_one_step` and `remove` are the only mutators and each is
//! all-or-nothing, so the two sides never disagree and no cell is ever
//! claimed twice.
//!
//! Coordinates grow east (x) and north (y). A footprint is anchored at its
//! top-left cell: the lowest x and the highest y it covers.

use floorsim_core::id::EntityId;
use floorsim_core::registry::Size;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::fmt;
use std::str::FromStr;

pub mod layout;
pub mod pathfinding;

pub use layout::{Assignment, LayoutEntry, LayoutError, LayoutReport, RejectReason, apply_layout};
pub use pathfinding::{PathError, find_path, find_path_to_any};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    pub fn step(&self, dir: Direction) -> GridPosition {
        let (dx, dy) = dir.offset();
        GridPosition::new(self.x + dx, self.y + dy)
    }

    /// Direction of a single orthogonal step from `self` to `to`.
    pub fn direction_to(&self, to: GridPosition) -> Option<Direction> {
        Direction::all().into_iter().find(|&d| self.step(d) == to)
    }
}

/// Cell identity string `"x:y"`.
impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed cell id `{0}`, expected `x:y`")]
pub struct CellIdError(pub String);

impl FromStr for GridPosition {
    type Err = CellIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || CellIdError(s.to_string());
        let (x, y) = s.split_once(':').ok_or_else(err)?;
        let x = x.trim().parse().map_err(|_| err())?;
        let y = y.trim().parse().map_err(|_| err())?;
        Ok(GridPosition::new(x, y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Offset for this direction; north is +y.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }
}

/// The rectangle covered by one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub anchor: GridPosition,
    pub size: Size,
}

impl Footprint {
    pub fn new(anchor: GridPosition, size: Size) -> Self {
        Self { anchor, size }
    }

    pub fn min_x(&self) -> i32 {
        self.anchor.x
    }

    pub fn max_x(&self) -> i32 {
        self.anchor.x + self.size.width as i32 - 1
    }

    pub fn min_y(&self) -> i32 {
        self.anchor.y - self.size.height as i32 + 1
    }

    pub fn max_y(&self) -> i32 {
        self.anchor.y
    }

    /// Covered cells, row-major from the anchor (west to east, then
    /// southwards).
    pub fn cells(&self) -> impl Iterator<Item = GridPosition> {
        let Footprint { anchor, size } = *self;
        (0..size.height as i32).flat_map(move |dy| {
            (0..size.width as i32).map(move |dx| GridPosition::new(anchor.x + dx, anchor.y - dy))
        })
    }

    pub fn contains(&self, pos: GridPosition) -> bool {
        (self.min_x()..=self.max_x()).contains(&pos.x)
            && (self.min_y()..=self.max_y()).contains(&pos.y)
    }

    pub fn shifted(&self, dir: Direction) -> Footprint {
        Footprint::new(self.anchor.step(dir), self.size)
    }

    /// Whether two rectangles share an edge segment without overlapping.
    pub fn touches(&self, other: &Footprint) -> bool {
        let x_overlap = self.min_x() <= other.max_x() && other.min_x() <= self.max_x();
        let y_overlap = self.min_y() <= other.max_y() && other.min_y() <= self.max_y();
        let x_abut = self.max_x() + 1 == other.min_x() || other.max_x() + 1 == self.min_x();
        let y_abut = self.max_y() + 1 == other.min_y() || other.max_y() + 1 == self.min_y();
        (x_overlap && y_abut) || (y_overlap && x_abut)
    }

    pub fn overlaps(&self, other: &Footprint) -> bool {
        self.min_x() <= other.max_x()
            && other.min_x() <= self.max_x()
            && self.min_y() <= other.max_y()
            && other.min_y() <= self.max_y()
    }

    pub fn manhattan_gap(&self, pos: GridPosition) -> u32 {
        let dx = (self.min_x() - pos.x).max(pos.x - self.max_x()).max(0);
        let dy = (self.min_y() - pos.y).max(pos.y - self.max_y()).max(0);
        (dx + dy) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpatialError {
    #[error("cell {pos} is occupied")]
    Occupied { pos: GridPosition, by: EntityId },
    #[error("cell {0} is outside the grid")]
    OutOfBounds(GridPosition),
    #[error("entity is not placed on the grid")]
    NotPlaced,
    #[error("entity has no registered size")]
    NotRegistered,
    #[error("a {width}x{height} footprint does not fit the grid")]
    InvalidFootprint { width: u32, height: u32 },
    #[error("grid and registry disagree: {0}")]
    Inconsistent(String),
    #[error("snapshot encoding failed: {0}")]
    Snapshot(String),
}

// ---------------------------------------------------------------------------
// FloorGrid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FloorGrid {
    width: u32,
    height: u32,
    cells: Vec<Option<EntityId>>,
    sizes: SecondaryMap<EntityId, Size>,
    footprints: SecondaryMap<EntityId, Footprint>,
}

/// Serialized image of the grid, for byte-for-byte comparison.
#[derive(Serialize)]
struct GridSnapshot<'a> {
    width: u32,
    height: u32,
    cells: &'a [Option<EntityId>],
    footprints: Vec<(EntityId, Footprint)>,
}

impl FloorGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; (width as usize) * (height as usize)],
            sizes: SecondaryMap::new(),
            footprints: SecondaryMap::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn in_bounds(&self, pos: GridPosition) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Row-major index of an in-bounds cell.
    pub fn index_of(&self, pos: GridPosition) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| pos.y as usize * self.width as usize + pos.x as usize)
    }

    pub fn position_of(&self, index: usize) -> GridPosition {
        let w = self.width as usize;
        GridPosition::new((index % w) as i32, (index / w) as i32)
    }

    // -- Registry --

    /// Declare an entity's size before its first placement.
    pub fn register(&mut self, entity: EntityId, size: Size) -> Result<(), SpatialError> {
        if size.is_empty() || size.width > self.width || size.height > self.height {
            return Err(SpatialError::InvalidFootprint {
                width: size.width,
                height: size.height,
            });
        }
        self.sizes.insert(entity, size);
        Ok(())
    }

    pub fn size_of(&self, entity: EntityId) -> Option<Size> {
        self.sizes.get(entity).copied()
    }

    pub fn footprint(&self, entity: EntityId) -> Option<Footprint> {
        self.footprints.get(entity).copied()
    }

    pub fn anchor(&self, entity: EntityId) -> Option<GridPosition> {
        self.footprints.get(entity).map(|f| f.anchor)
    }

    pub fn is_placed(&self, entity: EntityId) -> bool {
        self.footprints.contains_key(entity)
    }

    pub fn occupant(&self, pos: GridPosition) -> Option<EntityId> {
        self.index_of(pos).and_then(|i| self.cells[i])
    }

    /// Placed entities in slot order.
    pub fn placed(&self) -> impl Iterator<Item = (EntityId, &Footprint)> {
        self.footprints.iter()
    }

    // -- Placement --

    /// Check that `entity` could stand at `anchor`: every covered cell is in
    /// bounds and empty or already owned by `entity`.
    pub fn check_fit(&self, entity: EntityId, anchor: GridPosition) -> Result<Footprint, SpatialError> {
        let size = self.size_of(entity).ok_or(SpatialError::NotRegistered)?;
        let target = Footprint::new(anchor, size);
        for pos in target.cells() {
            let idx = self.index_of(pos).ok_or(SpatialError::OutOfBounds(pos))?;
            match self.cells[idx] {
                Some(other) if other != entity => {
                    return Err(SpatialError::Occupied { pos, by: other });
                }
                _ => {}
            }
        }
        Ok(target)
    }

    pub fn fits(&self, entity: EntityId, anchor: GridPosition) -> bool {
        self.check_fit(entity, anchor).is_ok()
    }

    /// Claim the footprint at `anchor`. If the entity is already placed its
    /// old cells are released in the same operation.
    pub fn place(&mut self, entity: EntityId, anchor: GridPosition) -> Result<(), SpatialError> {
        let target = self.check_fit(entity, anchor)?;
        if let Some(old) = self.footprints.get(entity).copied() {
            self.clear_cells(old.cells());
        }
        self.write_cells(entity, target.cells());
        self.footprints.insert(entity, target);
        Ok(())
    }

    /// Slide the footprint one cell. Only the entered row or column is
    /// checked; the entity's own trailing cells never block it.
    pub fn move_one_step(&mut self, entity: EntityId, dir: Direction) -> Result<GridPosition, SpatialError> {
        let old = self.footprint(entity).ok_or(SpatialError::NotPlaced)?;
        let new = old.shifted(dir);
        let mut leading = Vec::with_capacity(old.size.width.max(old.size.height) as usize);
        for pos in new.cells() {
            let idx = self.index_of(pos).ok_or(SpatialError::OutOfBounds(pos))?;
            if old.contains(pos) {
                continue;
            }
            if let Some(other) = self.cells[idx] {
                return Err(SpatialError::Occupied { pos, by: other });
            }
            leading.push(pos);
        }
        let trailing: Vec<GridPosition> = old.cells().filter(|p| !new.contains(*p)).collect();
        self.clear_cells(trailing);
        self.write_cells(entity, leading);
        self.footprints.insert(entity, new);
        Ok(new.anchor)
    }

    /// Vacate all cells of `entity`. Returns the vacated footprint so the
    /// caller can restore it exactly.
    pub fn remove(&mut self, entity: EntityId) -> Result<Footprint, SpatialError> {
        let old = self.footprints.remove(entity).ok_or(SpatialError::NotPlaced)?;
        self.clear_cells(old.cells());
        Ok(old)
    }

    fn clear_cells(&mut self, cells: impl IntoIterator<Item = GridPosition>) {
        for pos in cells {
            if let Some(i) = self.index_of(pos) {
                self.cells[i] = None;
            }
        }
    }

    fn write_cells(&mut self, entity: EntityId, cells: impl IntoIterator<Item = GridPosition>) {
        for pos in cells {
            if let Some(i) = self.index_of(pos) {
                self.cells[i] = Some(entity);
            }
        }
    }

    // -- Queries --

    /// Whether two placed entities share an edge.
    pub fn is_adjacent(&self, a: EntityId, b: EntityId) -> bool {
        match (self.footprint(a), self.footprint(b)) {
            (Some(fa), Some(fb)) => fa.touches(&fb),
            _ => false,
        }
    }

    /// In-bounds anchors at which `entity` would touch `target` edge-on,
    /// listed west, east, south, north. Occupancy is not checked.
    pub fn docking_positions(&self, entity: EntityId, target: EntityId) -> Vec<GridPosition> {
        let (Some(size), Some(t)) = (self.size_of(entity), self.footprint(target)) else {
            return Vec::new();
        };
        let (w, h) = (size.width as i32, size.height as i32);
        let mut out = Vec::new();
        for ay in t.min_y()..=t.max_y() + h - 1 {
            out.push(GridPosition::new(t.min_x() - w, ay));
        }
        for ay in t.min_y()..=t.max_y() + h - 1 {
            out.push(GridPosition::new(t.max_x() + 1, ay));
        }
        for ax in t.min_x() - w + 1..=t.max_x() {
            out.push(GridPosition::new(ax, t.min_y() - 1));
        }
        for ax in t.min_x() - w + 1..=t.max_x() {
            out.push(GridPosition::new(ax, t.max_y() + h));
        }
        out.retain(|&a| Footprint::new(a, size).cells().all(|c| self.in_bounds(c)));
        out
    }

    /// Verify that every occupied cell belongs to its owner's footprint and
    /// every footprint is fully backed by cells of the declared size.
    pub fn check_consistency(&self) -> Result<(), SpatialError> {
        let mut backed = 0usize;
        for (entity, fp) in self.footprints.iter() {
            if self.sizes.get(entity) != Some(&fp.size) {
                return Err(SpatialError::Inconsistent(format!(
                    "footprint at {} has the wrong size",
                    fp.anchor
                )));
            }
            for pos in fp.cells() {
                if self.occupant(pos) != Some(entity) {
                    return Err(SpatialError::Inconsistent(format!(
                        "cell {pos} is not held by the entity whose footprint covers it"
                    )));
                }
                backed += 1;
            }
        }
        let occupied = self.cells.iter().filter(|c| c.is_some()).count();
        if occupied != backed {
            return Err(SpatialError::Inconsistent(format!(
                "{occupied} occupied cells but {backed} footprint cells"
            )));
        }
        Ok(())
    }

    /// Bitcode image of the cells and footprints.
    pub fn snapshot(&self) -> Result<Vec<u8>, SpatialError> {
        let snap = GridSnapshot {
            width: self.width,
            height: self.height,
            cells: &self.cells,
            footprints: self.footprints.iter().map(|(e, f)| (e, *f)).collect(),
        };
        bitcode::serialize(&snap).map_err(|e| SpatialError::Snapshot(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn make_entities(count: usize) -> (SlotMap<EntityId, ()>, Vec<EntityId>) {
        let mut sm = SlotMap::with_key();
        let ids: Vec<EntityId> = (0..count).map(|_| sm.insert(())).collect();
        (sm, ids)
    }

    fn grid_with(sizes: &[Size]) -> (FloorGrid, Vec<EntityId>) {
        let (_sm, ids) = make_entities(sizes.len());
        let mut grid = FloorGrid::new(10, 10);
        for (&id, &size) in ids.iter().zip(sizes) {
            grid.register(id, size).unwrap();
        }
        (grid, ids)
    }

    // -----------------------------------------------------------------------
    // Positions and footprints
    // -----------------------------------------------------------------------

    #[test]
    fn cell_id_round_trip() {
        let pos = GridPosition::new(3, 12);
        assert_eq!(pos.to_string(), "3:12");
        assert_eq!("3:12".parse::<GridPosition>().unwrap(), pos);
        assert!("3-12".parse::<GridPosition>().is_err());
        assert!("a:1".parse::<GridPosition>().is_err());
    }

    #[test]
    fn footprint_extends_down_from_anchor() {
        let fp = Footprint::new(GridPosition::new(2, 5), Size::new(2, 3));
        let cells: Vec<_> = fp.cells().collect();
        assert_eq!(cells[0], GridPosition::new(2, 5));
        assert_eq!(cells[1], GridPosition::new(3, 5));
        assert_eq!(cells[5], GridPosition::new(3, 3));
        assert_eq!(fp.min_y(), 3);
        assert_eq!(fp.max_x(), 3);
    }

    #[test]
    fn touching_requires_shared_edge() {
        let a = Footprint::new(GridPosition::new(0, 1), Size::new(2, 2));
        let east = Footprint::new(GridPosition::new(2, 1), Size::UNIT);
        let diagonal = Footprint::new(GridPosition::new(2, 2), Size::UNIT);
        let gap = Footprint::new(GridPosition::new(3, 1), Size::UNIT);
        assert!(a.touches(&east));
        assert!(!a.touches(&diagonal));
        assert!(!a.touches(&gap));
        assert!(!a.touches(&a));
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    #[test]
    fn register_rejects_bad_sizes() {
        let (_sm, ids) = make_entities(1);
        let mut grid = FloorGrid::new(4, 4);
        assert!(matches!(
            grid.register(ids[0], Size::new(0, 1)),
            Err(SpatialError::InvalidFootprint { .. })
        ));
        assert!(grid.register(ids[0], Size::new(5, 1)).is_err());
    }

    #[test]
    fn place_claims_every_cell() {
        let (mut grid, ids) = grid_with(&[Size::new(2, 2)]);
        grid.place(ids[0], GridPosition::new(3, 4)).unwrap();
        for pos in [(3, 4), (4, 4), (3, 3), (4, 3)] {
            assert_eq!(grid.occupant(GridPosition::new(pos.0, pos.1)), Some(ids[0]));
        }
        assert_eq!(grid.occupant(GridPosition::new(3, 5)), None);
        grid.check_consistency().unwrap();
    }

    #[test]
    fn place_unregistered_fails() {
        let (_sm, ids) = make_entities(1);
        let mut grid = FloorGrid::new(4, 4);
        assert_eq!(
            grid.place(ids[0], GridPosition::new(0, 0)),
            Err(SpatialError::NotRegistered)
        );
    }

    #[test]
    fn partial_overlap_changes_nothing() {
        let (mut grid, ids) = grid_with(&[Size::UNIT, Size::new(2, 2)]);
        grid.place(ids[0], GridPosition::new(4, 4)).unwrap();
        let before = grid.snapshot().unwrap();
        let err = grid.place(ids[1], GridPosition::new(3, 5)).unwrap_err();
        assert_eq!(
            err,
            SpatialError::Occupied {
                pos: GridPosition::new(4, 4),
                by: ids[0]
            }
        );
        assert_eq!(grid.snapshot().unwrap(), before);
    }

    #[test]
    fn place_out_of_bounds() {
        let (mut grid, ids) = grid_with(&[Size::new(2, 2)]);
        assert!(matches!(
            grid.place(ids[0], GridPosition::new(9, 5)),
            Err(SpatialError::OutOfBounds(_))
        ));
        assert!(grid.place(ids[0], GridPosition::new(0, 0)).is_err());
        assert!(!grid.is_placed(ids[0]));
    }

    #[test]
    fn replace_may_overlap_own_cells() {
        let (mut grid, ids) = grid_with(&[Size::new(2, 1)]);
        grid.place(ids[0], GridPosition::new(0, 0)).unwrap();
        grid.place(ids[0], GridPosition::new(1, 0)).unwrap();
        assert_eq!(grid.occupant(GridPosition::new(0, 0)), None);
        assert_eq!(grid.occupant(GridPosition::new(2, 0)), Some(ids[0]));
        grid.check_consistency().unwrap();
    }

    #[test]
    fn remove_returns_exact_footprint() {
        let (mut grid, ids) = grid_with(&[Size::new(2, 2)]);
        grid.place(ids[0], GridPosition::new(5, 5)).unwrap();
        let fp = grid.remove(ids[0]).unwrap();
        assert_eq!(fp.anchor, GridPosition::new(5, 5));
        assert_eq!(grid.occupant(GridPosition::new(5, 5)), None);
        grid.place(ids[0], fp.anchor).unwrap();
        assert_eq!(grid.footprint(ids[0]), Some(fp));
        assert_eq!(grid.remove(ids[0]).map(|_| ()), Ok(()));
        assert_eq!(grid.remove(ids[0]), Err(SpatialError::NotPlaced));
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    #[test]
    fn move_slides_footprint() {
        let (mut grid, ids) = grid_with(&[Size::new(2, 2)]);
        grid.place(ids[0], GridPosition::new(2, 2)).unwrap();
        let anchor = grid.move_one_step(ids[0], Direction::North).unwrap();
        assert_eq!(anchor, GridPosition::new(2, 3));
        assert_eq!(grid.occupant(GridPosition::new(2, 1)), None);
        assert_eq!(grid.occupant(GridPosition::new(3, 3)), Some(ids[0]));
        grid.check_consistency().unwrap();
    }

    #[test]
    fn blocked_move_is_side_effect_free() {
        let (mut grid, ids) = grid_with(&[Size::new(2, 2), Size::UNIT]);
        grid.place(ids[0], GridPosition::new(2, 2)).unwrap();
        grid.place(ids[1], GridPosition::new(4, 1)).unwrap();
        let before = grid.snapshot().unwrap();
        assert!(matches!(
            grid.move_one_step(ids[0], Direction::East),
            Err(SpatialError::Occupied { .. })
        ));
        assert_eq!(grid.snapshot().unwrap(), before);
    }

    #[test]
    fn move_off_grid_fails() {
        let (mut grid, ids) = grid_with(&[Size::UNIT]);
        grid.place(ids[0], GridPosition::new(0, 0)).unwrap();
        let before = grid.snapshot().unwrap();
        assert!(matches!(
            grid.move_one_step(ids[0], Direction::South),
            Err(SpatialError::OutOfBounds(_))
        ));
        assert!(grid.move_one_step(ids[0], Direction::West).is_err());
        assert_eq!(grid.snapshot().unwrap(), before);
    }

    #[test]
    fn move_unplaced_fails() {
        let (mut grid, ids) = grid_with(&[Size::UNIT]);
        assert_eq!(
            grid.move_one_step(ids[0], Direction::North),
            Err(SpatialError::NotPlaced)
        );
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn adjacency_between_entities() {
        let (mut grid, ids) = grid_with(&[Size::new(2, 2), Size::UNIT, Size::UNIT]);
        grid.place(ids[0], GridPosition::new(2, 3)).unwrap();
        grid.place(ids[1], GridPosition::new(4, 2)).unwrap();
        grid.place(ids[2], GridPosition::new(4, 4)).unwrap();
        assert!(grid.is_adjacent(ids[0], ids[1]));
        assert!(!grid.is_adjacent(ids[0], ids[2]));
    }

    #[test]
    fn docking_positions_touch_target() {
        let (mut grid, ids) = grid_with(&[Size::new(2, 2), Size::UNIT]);
        grid.place(ids[0], GridPosition::new(4, 5)).unwrap();
        let docks = grid.docking_positions(ids[1], ids[0]);
        assert_eq!(docks.len(), 8);
        let target = grid.footprint(ids[0]).unwrap();
        for a in docks {
            assert!(Footprint::new(a, Size::UNIT).touches(&target));
        }
    }

    #[test]
    fn docking_positions_clip_to_grid() {
        let (mut grid, ids) = grid_with(&[Size::UNIT, Size::UNIT]);
        grid.place(ids[0], GridPosition::new(0, 0)).unwrap();
        let docks = grid.docking_positions(ids[1], ids[0]);
        assert_eq!(docks, vec![GridPosition::new(1, 0), GridPosition::new(0, 1)]);
    }

    #[test]
    fn direction_between_neighbours() {
        let p = GridPosition::new(3, 3);
        assert_eq!(p.direction_to(GridPosition::new(3, 4)), Some(Direction::North));
        assert_eq!(p.direction_to(GridPosition::new(2, 3)), Some(Direction::West));
        assert_eq!(p.direction_to(GridPosition::new(4, 4)), None);
    }
}
