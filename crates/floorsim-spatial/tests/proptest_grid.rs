//! Property-based tests for grid occupancy.
//!
//! Random populations of rectangles are placed and pushed around; after every
//! operation no cell may belong to two footprints, and a failed move must
//! leave the grid byte-identical.

use floorsim_core::id::EntityId;
use floorsim_core::registry::Size;
use floorsim_spatial::{Direction, FloorGrid, GridPosition};
use proptest::prelude::*;
use slotmap::SlotMap;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
enum GridOp {
    Place { entity: usize, x: i32, y: i32 },
    Move { entity: usize, dir: Direction },
    Remove { entity: usize },
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::North),
        Just(Direction::East),
        Just(Direction::South),
        Just(Direction::West),
    ]
}

fn arb_sizes(max: usize) -> impl Strategy<Value = Vec<Size>> {
    proptest::collection::vec((1..=3u32, 1..=3u32).prop_map(|(w, h)| Size::new(w, h)), 1..=max)
}

fn arb_ops(max_ops: usize) -> impl Strategy<Value = Vec<GridOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..8usize, 0..12i32, 0..12i32).prop_map(|(entity, x, y)| GridOp::Place { entity, x, y }),
            (0..8usize, arb_direction()).prop_map(|(entity, dir)| GridOp::Move { entity, dir }),
            (0..8usize).prop_map(|entity| GridOp::Remove { entity }),
        ],
        1..=max_ops,
    )
}

fn populate(sizes: &[Size]) -> (FloorGrid, Vec<EntityId>) {
    let mut sm: SlotMap<EntityId, ()> = SlotMap::with_key();
    let mut grid = FloorGrid::new(12, 12);
    let ids = sizes
        .iter()
        .map(|&s| {
            let id = sm.insert(());
            grid.register(id, s).unwrap();
            id
        })
        .collect();
    (grid, ids)
}

fn assert_no_overlap(grid: &FloorGrid) {
    let mut owner = vec![None; grid.cell_count()];
    for (entity, fp) in grid.placed() {
        for pos in fp.cells() {
            let idx = grid.index_of(pos).expect("footprint cell in bounds");
            assert!(owner[idx].is_none(), "cell {pos} claimed twice");
            owner[idx] = Some(entity);
        }
    }
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// No cell is ever covered by two footprints, and the cell array always
    /// agrees with the registered footprints.
    #[test]
    fn no_overlap_under_random_ops(sizes in arb_sizes(8), ops in arb_ops(60)) {
        let (mut grid, ids) = populate(&sizes);
        for op in ops {
            match op {
                GridOp::Place { entity, x, y } => {
                    let _ = grid.place(ids[entity % ids.len()], GridPosition::new(x, y));
                }
                GridOp::Move { entity, dir } => {
                    let _ = grid.move_one_step(ids[entity % ids.len()], dir);
                }
                GridOp::Remove { entity } => {
                    let _ = grid.remove(ids[entity % ids.len()]);
                }
            }
            assert_no_overlap(&grid);
            prop_assert!(grid.check_consistency().is_ok());
        }
    }

    /// A rejected move changes nothing; an accepted one shifts the anchor by
    /// exactly one cell and keeps the size.
    #[test]
    fn moves_are_atomic(sizes in arb_sizes(6), placements in proptest::collection::vec((0..12i32, 0..12i32), 6), dirs in proptest::collection::vec((0..6usize, arb_direction()), 1..40)) {
        let (mut grid, ids) = populate(&sizes);
        for (id, (x, y)) in ids.iter().zip(placements) {
            let _ = grid.place(*id, GridPosition::new(x, y));
        }
        for (entity, dir) in dirs {
            let id = ids[entity % ids.len()];
            let before = grid.snapshot().unwrap();
            let old = grid.footprint(id);
            match grid.move_one_step(id, dir) {
                Ok(anchor) => {
                    let old = old.expect("moved entity was placed");
                    prop_assert_eq!(anchor, old.anchor.step(dir));
                    prop_assert_eq!(grid.footprint(id).map(|f| f.size), Some(old.size));
                }
                Err(_) => prop_assert_eq!(grid.snapshot().unwrap(), before),
            }
        }
    }
}
