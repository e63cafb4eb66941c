//! Sparse hash grid for efficient neighbor queries

use ahash::AHashMap;

use crate::core::types::Vec2;

/// Sparse hash grid for O(1) neighbor queries
///
/// Entries are whatever handle the caller uses to look positions back up,
/// typically a slot index into the agent columns.
#[derive(Debug, Clone)]
pub struct SparseHashGrid<T: Copy + PartialEq = usize> {
    cell_size: f32,
    cells: AHashMap<(i32, i32), Vec<T>>,
}

impl<T: Copy + PartialEq> SparseHashGrid<T> {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            cells: AHashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    fn cell_coord(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn insert(&mut self, entry: T, pos: Vec2) {
        let coord = self.cell_coord(pos);
        self.cells.entry(coord).or_default().push(entry);
    }

    pub fn remove(&mut self, entry: T, pos: Vec2) {
        let coord = self.cell_coord(pos);
        if let Some(cell) = self.cells.get_mut(&coord) {
            cell.retain(|&e| e != entry);
        }
    }

    /// Query all entries in neighboring cells (3x3 neighborhood)
    pub fn query_neighbors(&self, pos: Vec2) -> impl Iterator<Item = T> + '_ {
        let (cx, cy) = self.cell_coord(pos);

        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                self.cells
                    .get(&(cx + dx, cy + dy))
                    .into_iter()
                    .flatten()
                    .copied()
            })
        })
    }

    /// Rebuild grid from positions
    pub fn rebuild(&mut self, entries: impl Iterator<Item = (T, Vec2)>) {
        self.clear();
        for (entry, pos) in entries {
            self.insert(entry, pos);
        }
    }
}

impl SparseHashGrid<usize> {
    /// Slot indices within `radius` of `center`, where entries index `positions`
    pub fn query_radius(&self, center: Vec2, radius: f32, positions: &[Vec2]) -> Vec<usize> {
        let radius_sq = radius * radius;
        self.query_neighbors(center)
            .filter(|&idx| {
                positions
                    .get(idx)
                    .map(|pos| center.distance_squared(pos) <= radius_sq)
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_cover_adjacent_cells() {
        let mut grid: SparseHashGrid = SparseHashGrid::new(100.0);
        grid.insert(0, Vec2::new(50.0, 50.0));
        grid.insert(1, Vec2::new(150.0, 50.0));
        grid.insert(2, Vec2::new(450.0, 450.0));

        let found: Vec<_> = grid.query_neighbors(Vec2::new(60.0, 60.0)).collect();
        assert!(found.contains(&0));
        assert!(found.contains(&1));
        assert!(!found.contains(&2));
    }

    #[test]
    fn test_query_radius_filters_by_distance() {
        let positions = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(30.0, 0.0),
            Vec2::new(90.0, 0.0),
        ];
        let mut grid = SparseHashGrid::new(100.0);
        grid.rebuild(positions.iter().copied().enumerate());

        let mut near = grid.query_radius(Vec2::ZERO, 50.0, &positions);
        near.sort();
        assert_eq!(near, vec![0, 1]);
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid: SparseHashGrid = SparseHashGrid::new(10.0);
        grid.insert(5, Vec2::new(-5.0, -5.0));
        let found: Vec<_> = grid.query_neighbors(Vec2::new(1.0, 1.0)).collect();
        assert_eq!(found, vec![5]);
    }

    #[test]
    fn test_remove() {
        let mut grid: SparseHashGrid = SparseHashGrid::new(10.0);
        let pos = Vec2::new(3.0, 3.0);
        grid.insert(1, pos);
        grid.remove(1, pos);
        assert_eq!(grid.query_neighbors(pos).count(), 0);
    }
}
