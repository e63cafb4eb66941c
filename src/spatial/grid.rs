//! Generic grid for spatial data

use crate::core::types::{Rect, Vec2};

/// Generic 2D grid with configurable cell size
#[derive(Debug, Clone)]
pub struct Grid<T: Clone + Default> {
    pub width: usize,
    pub height: usize,
    pub cell_size: f32,
    pub origin: Vec2,
    data: Vec<T>,
}

impl<T: Clone + Default> Grid<T> {
    pub fn new(width: usize, height: usize, cell_size: f32, origin: Vec2) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cell_size,
            origin,
            data: vec![T::default(); width * height],
        }
    }

    /// Grid covering `bounds` with cells of `cell_size`
    pub fn covering(bounds: Rect, cell_size: f32) -> Self {
        let cell_size = cell_size.max(1.0);
        let width = (bounds.width / cell_size).ceil() as usize;
        let height = (bounds.height / cell_size).ceil() as usize;
        Self::new(width, height, cell_size, Vec2::new(bounds.x, bounds.y))
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x < self.width && y < self.height {
            Some(&self.data[y * self.width + x])
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        if x < self.width && y < self.height {
            Some(&mut self.data[y * self.width + x])
        } else {
            None
        }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Convert world position to cell coordinates, clamped to the grid
    #[inline]
    pub fn world_to_cell(&self, pos: Vec2) -> (usize, usize) {
        let x = ((pos.x - self.origin.x) / self.cell_size).floor() as i32;
        let y = ((pos.y - self.origin.y) / self.cell_size).floor() as i32;
        (
            x.clamp(0, self.width as i32 - 1) as usize,
            y.clamp(0, self.height as i32 - 1) as usize,
        )
    }

    /// Sample grid at world position
    pub fn sample(&self, pos: Vec2) -> Option<&T> {
        let (x, y) = self.world_to_cell(pos);
        self.get(x, y)
    }

    /// Cell center in world coordinates
    pub fn cell_center(&self, x: usize, y: usize) -> Vec2 {
        Vec2::new(
            self.origin.x + (x as f32 + 0.5) * self.cell_size,
            self.origin.y + (y as f32 + 0.5) * self.cell_size,
        )
    }

    /// Iterate `(x, y, value)` over every cell
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        self.data
            .iter()
            .enumerate()
            .map(move |(i, v)| (i % self.width, i / self.width, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covering_rounds_up() {
        let grid: Grid<f64> = Grid::covering(Rect::new(0.0, 0.0, 1000.0, 500.0), 160.0);
        assert_eq!(grid.width, 7);
        assert_eq!(grid.height, 4);
    }

    #[test]
    fn test_world_to_cell_clamps() {
        let grid: Grid<u8> = Grid::covering(Rect::new(100.0, 100.0, 200.0, 200.0), 100.0);
        assert_eq!(grid.world_to_cell(Vec2::new(0.0, 0.0)), (0, 0));
        assert_eq!(grid.world_to_cell(Vec2::new(150.0, 250.0)), (0, 1));
        assert_eq!(grid.world_to_cell(Vec2::new(9999.0, 9999.0)), (1, 1));
    }

    #[test]
    fn test_cell_center_round_trip() {
        let grid: Grid<u8> = Grid::covering(Rect::new(0.0, 0.0, 400.0, 400.0), 100.0);
        let c = grid.cell_center(2, 3);
        assert_eq!(c, Vec2::new(250.0, 350.0));
        assert_eq!(grid.world_to_cell(c), (2, 3));
    }
}
