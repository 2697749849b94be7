//! Spatial partitioning for efficient neighbor queries.
//!
//! A uniform hash grid rebuilt from scratch every tick. Entries are snapshot
//! indices, so the grid never outlives the tick that built it.
//!
//! The cell size is the largest interaction radius in the set (but never below
//! a floor), which bounds every radius query to the 3×3 block of cells around
//! the query point: O(N) to build, 9 cell lookups per query.

use std::collections::HashMap;

/// Default lower bound for the cell size, in world units.
pub const MIN_CELL_SIZE: f32 = 0.25;

/// One item to bucket: a snapshot index, its planar position and the radius
/// it interacts with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridEntry {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl GridEntry {
    pub fn new(index: usize, x: f32, y: f32, radius: f32) -> Self {
        Self { index, x, y, radius }
    }
}

/// Grid-based spatial partitioning structure.
///
/// Cells are keyed by an exact packing of the two cell coordinates into a
/// `u64`, so distinct cells never share a bucket.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid {
    cell_size: f32,
    inv_cell_size: f32,
    cells: HashMap<u64, Vec<usize>>,
    len: usize,
}

impl Default for SpatialHashGrid {
    fn default() -> Self {
        Self::build(&[], MIN_CELL_SIZE)
    }
}

impl SpatialHashGrid {
    /// Build a grid over `entries`.
    ///
    /// Cell size is `max(min_cell_size, largest finite radius)`. Entries with a
    /// non-finite position are left out.
    pub fn build(entries: &[GridEntry], min_cell_size: f32) -> Self {
        let floor = if min_cell_size.is_finite() && min_cell_size > 0.0 {
            min_cell_size
        } else {
            MIN_CELL_SIZE
        };
        let cell_size = entries
            .iter()
            .map(|e| e.radius)
            .filter(|r| r.is_finite())
            .fold(floor, f32::max);
        let inv_cell_size = 1.0 / cell_size;

        let mut grid = Self {
            cell_size,
            inv_cell_size,
            cells: HashMap::with_capacity(entries.len()),
            len: 0,
        };

        for entry in entries {
            if !entry.x.is_finite() || !entry.y.is_finite() {
                continue;
            }
            let (cx, cy) = grid.cell_of(entry.x, entry.y);
            grid.cells
                .entry(Self::cell_key(cx, cy))
                .or_default()
                .push(entry.index);
            grid.len += 1;
        }

        grid
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn inv_cell_size(&self) -> f32 {
        self.inv_cell_size
    }

    /// Convert planar world coordinates to cell coordinates.
    #[inline]
    pub fn cell_of(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x * self.inv_cell_size).floor() as i32,
            (y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Collision-free key for a cell.
    #[inline]
    pub fn cell_key(cx: i32, cy: i32) -> u64 {
        ((cx as u32 as u64) << 32) | (cy as u32 as u64)
    }

    /// Visit every index stored in the 3×3 block of cells around `(x, y)`.
    ///
    /// Order is deterministic: column-major over the block (x offset outer,
    /// y offset inner), insertion order within a cell.
    pub fn for_each_neighbor<F>(&self, x: f32, y: f32, mut f: F)
    where
        F: FnMut(usize),
    {
        let (cx, cy) = self.cell_of(x, y);
        for dx in -1..=1 {
            for dy in -1..=1 {
                let key = Self::cell_key(cx.wrapping_add(dx), cy.wrapping_add(dy));
                if let Some(indices) = self.cells.get(&key) {
                    for &index in indices {
                        f(index);
                    }
                }
            }
        }
    }

    /// Collect the 3×3 neighborhood of `(x, y)` into `buf` (cleared first).
    pub fn neighbors_into(&self, x: f32, y: f32, buf: &mut Vec<usize>) {
        buf.clear();
        self.for_each_neighbor(x, y, |index| buf.push(index));
    }

    /// Number of bucketed entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cell_size_uses_largest_radius() {
        let entries = [
            GridEntry::new(0, 0.0, 0.0, 0.5),
            GridEntry::new(1, 1.0, 0.0, 2.0),
            GridEntry::new(2, 2.0, 0.0, f32::INFINITY),
        ];
        let grid = SpatialHashGrid::build(&entries, MIN_CELL_SIZE);
        assert_eq!(grid.cell_size(), 2.0);
        assert_eq!(grid.inv_cell_size(), 0.5);
        assert_eq!(grid.len(), 3);
    }

    #[test]
    fn test_cell_size_floor() {
        let entries = [GridEntry::new(0, 0.0, 0.0, 0.01)];
        let grid = SpatialHashGrid::build(&entries, MIN_CELL_SIZE);
        assert_eq!(grid.cell_size(), MIN_CELL_SIZE);

        let empty = SpatialHashGrid::default();
        assert!(empty.is_empty());
        assert_eq!(empty.cell_size(), MIN_CELL_SIZE);
    }

    #[test]
    fn test_negative_coordinates_floor() {
        let grid = SpatialHashGrid::build(&[GridEntry::new(0, 0.0, 0.0, 1.0)], MIN_CELL_SIZE);
        assert_eq!(grid.cell_of(-0.5, 0.5), (-1, 0));
        assert_eq!(grid.cell_of(-1.0, -1.5), (-1, -2));
    }

    #[test]
    fn test_cell_keys_are_distinct() {
        let a = SpatialHashGrid::cell_key(1, -1);
        let b = SpatialHashGrid::cell_key(-1, 1);
        let c = SpatialHashGrid::cell_key(0, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(SpatialHashGrid::cell_key(i32::MIN, 0), SpatialHashGrid::cell_key(0, i32::MIN));
    }

    #[test]
    fn test_neighbor_query_visits_adjacent_cells_only() {
        let entries = [
            GridEntry::new(0, 0.5, 0.5, 1.0),
            GridEntry::new(1, 1.5, 0.5, 1.0),   // adjacent cell
            GridEntry::new(2, -0.5, -0.5, 1.0), // diagonal cell
            GridEntry::new(3, 5.0, 5.0, 1.0),   // far away
        ];
        let grid = SpatialHashGrid::build(&entries, MIN_CELL_SIZE);

        let mut found = Vec::new();
        grid.neighbors_into(0.5, 0.5, &mut found);
        found.sort_unstable();
        assert_eq!(found, vec![0, 1, 2]);
    }

    #[test]
    fn test_non_finite_positions_skipped() {
        let entries = [
            GridEntry::new(0, f32::NAN, 0.0, 1.0),
            GridEntry::new(1, 0.0, 0.0, 1.0),
        ];
        let grid = SpatialHashGrid::build(&entries, MIN_CELL_SIZE);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let entries: Vec<GridEntry> = (0..200)
            .map(|i| {
                let f = i as f32;
                GridEntry::new(i, (f * 0.37).sin() * 10.0, (f * 0.91).cos() * 10.0, 0.8)
            })
            .collect();

        let first = SpatialHashGrid::build(&entries, MIN_CELL_SIZE);
        let second = SpatialHashGrid::build(&entries, MIN_CELL_SIZE);

        let mut a = Vec::new();
        let mut b = Vec::new();
        for e in &entries {
            first.neighbors_into(e.x, e.y, &mut a);
            second.neighbors_into(e.x, e.y, &mut b);
            assert_eq!(a, b);
        }
    }

    proptest! {
        #[test]
        fn prop_grid_finds_every_neighbor_within_radius(
            points in prop::collection::vec((-50.0f32..50.0, -50.0f32..50.0, 0.05f32..3.0), 2..80)
        ) {
            let entries: Vec<GridEntry> = points
                .iter()
                .enumerate()
                .map(|(i, &(x, y, r))| GridEntry::new(i, x, y, r))
                .collect();
            let grid = SpatialHashGrid::build(&entries, MIN_CELL_SIZE);

            let mut found = Vec::new();
            for a in &entries {
                grid.neighbors_into(a.x, a.y, &mut found);
                for b in &entries {
                    let dx = a.x - b.x;
                    let dy = a.y - b.y;
                    if dx * dx + dy * dy <= a.radius * a.radius {
                        prop_assert!(found.contains(&b.index));
                    }
                }
            }
        }
    }
}
