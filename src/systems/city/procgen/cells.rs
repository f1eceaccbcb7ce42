use bevy::prelude::*;

use super::error::{check_dimensions, CityGenError};

/// Dense 2D array over a `width x height` area, stored column-major (`x * height + y`).
/// Indexing is bounds-checked, out-of-range reads return `None` and writes are dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellGrid<T> {
    width: i32,
    height: i32,
    cells: Vec<T>,
}

impl<T: Copy> CellGrid<T> {
    pub fn new(width: i32, height: i32, fill: T) -> Result<Self, CityGenError> {
        check_dimensions(width, height)?;
        Ok(Self::filled(width, height, fill))
    }

    /// Like `new` for sizes already validated; negative sides become empty.
    pub fn filled(width: i32, height: i32, fill: T) -> Self {
        let (width, height) = (width.max(0), height.max(0));
        Self {
            width,
            height,
            cells: vec![fill; (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some((x * self.height + y) as usize)
        } else {
            None
        }
    }

    pub fn get(&self, x: i32, y: i32) -> Option<T> {
        self.index(x, y).map(|i| self.cells[i])
    }

    pub fn set(&mut self, x: i32, y: i32, value: T) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = value;
        }
    }

    /// Fill `[x0, x1) x [y0, y1)`, clipped to the grid.
    pub fn fill_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, value: T) {
        let (x0, x1) = (x0.max(0), x1.min(self.width));
        let (y0, y1) = (y0.max(0), y1.min(self.height));
        for x in x0..x1 {
            for y in y0..y1 {
                self.cells[(x * self.height + y) as usize] = value;
            }
        }
    }

    /// Cells of the grid with their positions, column by column.
    pub fn iter(&self) -> impl Iterator<Item = (IVec2, T)> + '_ {
        let height = self.height;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &value)| (IVec2::new(i as i32 / height, i as i32 % height), value))
    }
}

impl<T: Copy + PartialEq> CellGrid<T> {
    /// True when `[x, x + w) x [y, y + h)` lies inside the grid and every cell equals `value`.
    pub fn rect_is(&self, x: i32, y: i32, w: i32, h: i32, value: T) -> bool {
        if x < 0 || y < 0 || w > self.width - x || h > self.height - y {
            return false;
        }
        for cx in x..x + w {
            for cy in y..y + h {
                if self.cells[(cx * self.height + cy) as usize] != value {
                    return false;
                }
            }
        }
        true
    }

    pub fn count(&self, value: T) -> usize {
        self.cells.iter().filter(|&&c| c == value).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_area() {
        assert!(CellGrid::new(0, 4, false).is_err());
        assert!(CellGrid::new(4, -1, false).is_err());
    }

    #[test]
    fn fill_is_clipped_to_bounds() {
        let mut grid = CellGrid::new(4, 3, 0u8).unwrap();
        grid.fill_rect(-2, -2, 2, 10, 7);
        assert_eq!(grid.count(7), 2 * 3);
        assert_eq!(grid.get(1, 2), Some(7));
        assert_eq!(grid.get(2, 0), Some(0));
        assert_eq!(grid.get(4, 0), None);
    }

    #[test]
    fn rect_test_checks_bounds_and_contents() {
        let mut grid = CellGrid::new(5, 5, false).unwrap();
        assert!(grid.rect_is(0, 0, 5, 5, false));
        assert!(!grid.rect_is(1, 0, 5, 1, false));
        assert!(!grid.rect_is(-1, 0, 1, 1, false));
        grid.set(2, 2, true);
        assert!(!grid.rect_is(1, 1, 2, 2, false));
        assert!(grid.rect_is(3, 0, 2, 5, false));
    }
}
