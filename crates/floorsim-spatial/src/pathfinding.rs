//! A* routing over the floor grid for a single entity.
//!
//! Nodes are anchor positions. A neighbour is passable when the entity's
//! whole footprint fits there (in bounds, every covered cell empty or owned
//! by the entity itself), so a 2x2 robot never squeezes through a 1-wide
//! gap. The open set is a `BinaryHeap` min-heap via reversed `Ord`; ties on
//! f are broken by insertion order.

use crate::{Direction, FloorGrid, GridPosition};
use floorsim_core::id::EntityId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("no path to the goal")]
    NotFound,
    #[error("entity is not placed on the grid")]
    NotPlaced,
}

#[derive(Debug, PartialEq, Eq)]
struct OpenEntry {
    f: u32,
    counter: u64,
    index: usize,
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: lowest f, then earliest insertion, is greatest.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.counter.cmp(&self.counter))
    }
}

/// Shortest route for `entity` from its current anchor to `goal`.
///
/// Returns the anchors visited after the start, ending at `goal`; an empty
/// route when the entity already stands there.
pub fn find_path(
    grid: &FloorGrid,
    entity: EntityId,
    goal: GridPosition,
) -> Result<Vec<GridPosition>, PathError> {
    find_path_to_any(grid, entity, &[goal], None)
}

/// Shortest route to whichever of `goals` is reached first.
///
/// The heuristic is the minimum Manhattan distance over all goals, which
/// stays admissible. `budget` caps node expansions; it defaults to the grid
/// cell count.
pub fn find_path_to_any(
    grid: &FloorGrid,
    entity: EntityId,
    goals: &[GridPosition],
    budget: Option<usize>,
) -> Result<Vec<GridPosition>, PathError> {
    let start = grid.anchor(entity).ok_or(PathError::NotPlaced)?;
    if goals.contains(&start) {
        return Ok(Vec::new());
    }
    let goals: Vec<GridPosition> = goals.iter().copied().filter(|g| grid.in_bounds(*g)).collect();
    let Some(start_idx) = grid.index_of(start) else {
        return Err(PathError::NotPlaced);
    };
    if goals.is_empty() {
        return Err(PathError::NotFound);
    }

    let n = grid.cell_count();
    let mut is_goal = vec![false; n];
    for g in &goals {
        if let Some(i) = grid.index_of(*g) {
            is_goal[i] = true;
        }
    }
    let h = |pos: GridPosition| {
        goals
            .iter()
            .map(|g| pos.manhattan_distance(g))
            .min()
            .unwrap_or(0)
    };

    let mut g_score = vec![u32::MAX; n];
    let mut came_from = vec![usize::MAX; n];
    let mut closed = vec![false; n];
    let mut open = BinaryHeap::new();
    let mut counter = 0u64;
    let mut expansions = 0usize;
    let budget = budget.unwrap_or(n);

    g_score[start_idx] = 0;
    open.push(OpenEntry {
        f: h(start),
        counter,
        index: start_idx,
    });

    while let Some(OpenEntry { index, .. }) = open.pop() {
        if closed[index] {
            continue;
        }
        if is_goal[index] {
            return Ok(reconstruct(grid, &came_from, start_idx, index));
        }
        closed[index] = true;
        expansions += 1;
        if expansions > budget {
            break;
        }

        let pos = grid.position_of(index);
        let g_next = g_score[index] + 1;
        for dir in Direction::all() {
            let next = pos.step(dir);
            let Some(ni) = grid.index_of(next) else {
                continue;
            };
            if closed[ni] || g_next >= g_score[ni] || !grid.fits(entity, next) {
                continue;
            }
            g_score[ni] = g_next;
            came_from[ni] = index;
            counter += 1;
            open.push(OpenEntry {
                f: g_next + h(next),
                counter,
                index: ni,
            });
        }
    }

    Err(PathError::NotFound)
}

fn reconstruct(grid: &FloorGrid, came_from: &[usize], start: usize, goal: usize) -> Vec<GridPosition> {
    let mut path = Vec::new();
    let mut current = goal;
    while current != start {
        path.push(grid.position_of(current));
        current = came_from[current];
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use floorsim_core::registry::Size;
    use slotmap::SlotMap;

    fn setup(width: u32, height: u32, sizes: &[Size]) -> (FloorGrid, Vec<EntityId>) {
        let mut sm: SlotMap<EntityId, ()> = SlotMap::with_key();
        let mut grid = FloorGrid::new(width, height);
        let ids: Vec<EntityId> = sizes
            .iter()
            .map(|&s| {
                let id = sm.insert(());
                grid.register(id, s).unwrap();
                id
            })
            .collect();
        (grid, ids)
    }

    fn assert_contiguous(start: GridPosition, path: &[GridPosition]) {
        let mut prev = start;
        for &p in path {
            assert_eq!(prev.manhattan_distance(&p), 1, "{prev} -> {p}");
            prev = p;
        }
    }

    #[test]
    fn open_grid_path_is_minimal() {
        let (mut grid, ids) = setup(10, 10, &[Size::UNIT]);
        grid.place(ids[0], GridPosition::new(2, 2)).unwrap();
        let path = find_path(&grid, ids[0], GridPosition::new(9, 9)).unwrap();
        assert_eq!(path.len(), 14);
        assert_eq!(path.last(), Some(&GridPosition::new(9, 9)));
        assert_contiguous(GridPosition::new(2, 2), &path);
    }

    #[test]
    fn already_at_goal_is_empty() {
        let (mut grid, ids) = setup(5, 5, &[Size::UNIT]);
        grid.place(ids[0], GridPosition::new(1, 1)).unwrap();
        assert!(find_path(&grid, ids[0], GridPosition::new(1, 1)).unwrap().is_empty());
    }

    #[test]
    fn routes_around_a_wall() {
        // Wall at x = 3 from y = 0 to y = 3, leaving y = 4 open.
        let mut sizes = vec![Size::UNIT];
        sizes.push(Size::new(1, 4));
        let (mut grid, ids) = setup(6, 5, &sizes);
        grid.place(ids[0], GridPosition::new(1, 0)).unwrap();
        grid.place(ids[1], GridPosition::new(3, 3)).unwrap();
        let path = find_path(&grid, ids[0], GridPosition::new(5, 0)).unwrap();
        assert!(path.contains(&GridPosition::new(3, 4)));
        assert_eq!(path.len(), 12);
        assert_contiguous(GridPosition::new(1, 0), &path);
    }

    #[test]
    fn wide_robot_refuses_narrow_gap() {
        // Two walls at x = 4 leave a single open cell at (4, 2).
        let sizes = [Size::new(2, 2), Size::UNIT, Size::new(1, 2), Size::new(1, 2)];
        let (mut grid, ids) = setup(9, 5, &sizes);
        grid.place(ids[2], GridPosition::new(4, 1)).unwrap();
        grid.place(ids[3], GridPosition::new(4, 4)).unwrap();

        grid.place(ids[0], GridPosition::new(0, 3)).unwrap();
        assert_eq!(
            find_path(&grid, ids[0], GridPosition::new(7, 3)),
            Err(PathError::NotFound)
        );

        grid.place(ids[1], GridPosition::new(0, 0)).unwrap();
        let path = find_path(&grid, ids[1], GridPosition::new(8, 2)).unwrap();
        assert!(path.contains(&GridPosition::new(4, 2)));
    }

    #[test]
    fn own_cells_do_not_block() {
        let (mut grid, ids) = setup(6, 6, &[Size::new(2, 2)]);
        grid.place(ids[0], GridPosition::new(1, 3)).unwrap();
        let path = find_path(&grid, ids[0], GridPosition::new(2, 3)).unwrap();
        assert_eq!(path, vec![GridPosition::new(2, 3)]);
    }

    #[test]
    fn unreachable_goal_is_an_error_value() {
        let (mut grid, ids) = setup(5, 5, &[Size::UNIT, Size::UNIT]);
        grid.place(ids[0], GridPosition::new(0, 0)).unwrap();
        grid.place(ids[1], GridPosition::new(4, 4)).unwrap();
        assert_eq!(
            find_path(&grid, ids[0], GridPosition::new(4, 4)),
            Err(PathError::NotFound)
        );
        assert_eq!(
            find_path(&grid, ids[0], GridPosition::new(7, 7)),
            Err(PathError::NotFound)
        );
    }

    #[test]
    fn unplaced_entity_fails() {
        let (grid, ids) = setup(5, 5, &[Size::UNIT]);
        assert_eq!(
            find_path(&grid, ids[0], GridPosition::new(1, 1)),
            Err(PathError::NotPlaced)
        );
    }

    #[test]
    fn multi_goal_reaches_nearest() {
        let (mut grid, ids) = setup(10, 10, &[Size::UNIT]);
        grid.place(ids[0], GridPosition::new(5, 5)).unwrap();
        let goals = [GridPosition::new(9, 9), GridPosition::new(5, 7)];
        let path = find_path_to_any(&grid, ids[0], &goals, None).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.last(), Some(&GridPosition::new(5, 7)));
    }

    #[test]
    fn budget_limits_search() {
        let (mut grid, ids) = setup(20, 20, &[Size::UNIT]);
        grid.place(ids[0], GridPosition::new(0, 0)).unwrap();
        assert_eq!(
            find_path_to_any(&grid, ids[0], &[GridPosition::new(19, 19)], Some(3)),
            Err(PathError::NotFound)
        );
    }

    #[test]
    fn search_is_deterministic() {
        let (mut grid, ids) = setup(12, 12, &[Size::UNIT, Size::new(3, 3)]);
        grid.place(ids[0], GridPosition::new(0, 0)).unwrap();
        grid.place(ids[1], GridPosition::new(5, 7)).unwrap();
        let a = find_path(&grid, ids[0], GridPosition::new(11, 11)).unwrap();
        let b = find_path(&grid, ids[0], GridPosition::new(11, 11)).unwrap();
        assert_eq!(a, b);
    }
}
