//! Fixed-size boolean raster addressed by `(column, row)`.

use bevy::math::UVec2;

use crate::coords::{cell_area, total_grid_area};

/// Row-major boolean grid shared by the scanned and revealed layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellMap {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl CellMap {
    /// Create a map with every cell cleared.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, false)
    }

    pub fn filled(width: u32, height: u32, value: bool) -> Self {
        let total = width as usize * height as usize;
        Self {
            width,
            height,
            cells: vec![value; total],
        }
    }

    /// Build from a flat row-major vector; `None` if the length is wrong.
    pub fn from_row_major(width: u32, height: u32, cells: Vec<bool>) -> Option<Self> {
        if cells.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            cells,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn same_dimensions(&self, other: &CellMap) -> bool {
        self.width == other.width && self.height == other.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// Cell value, `false` outside the grid.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.index(x, y)
            .map(|idx| self.cells[idx])
            .unwrap_or(false)
    }

    /// Set a cell, returning its previous value or `None` outside the grid.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) -> Option<bool> {
        let idx = self.index(x, y)?;
        Some(std::mem::replace(&mut self.cells[idx], value))
    }

    pub fn fill(&mut self, value: bool) {
        self.cells.fill(value);
    }

    pub fn count_set(&self) -> usize {
        self.cells.iter().filter(|cell| **cell).count()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| *cell)
    }

    /// Row-major view of the raw cells.
    pub fn as_slice(&self) -> &[bool] {
        &self.cells
    }

    pub fn iter_cells(&self) -> impl Iterator<Item = (UVec2, bool)> + '_ {
        let width = self.width.max(1) as usize;
        self.cells.iter().enumerate().map(move |(idx, cell)| {
            let x = (idx % width) as u32;
            let y = (idx / width) as u32;
            (UVec2::new(x, y), *cell)
        })
    }

    /// Export as a flat byte array (row-major, 1 = set).
    pub fn to_byte_raster(&self) -> Vec<u8> {
        self.cells.iter().map(|cell| u8::from(*cell)).collect()
    }

    /// Fraction of true surface area covered by set cells.
    ///
    /// Exactly 1 when every cell is set and exactly 0 when none are, so a
    /// complete map never reads as fractionally short.
    pub fn area_weighted_fraction(&self) -> f64 {
        let set = self.count_set();
        if set == self.cells.len() {
            return 1.0;
        }
        if set == 0 {
            return 0.0;
        }
        let total = total_grid_area(self.width, self.height);
        if total <= 0.0 {
            return 0.0;
        }
        let covered: f64 = (0..self.height)
            .map(|row| {
                let start = row as usize * self.width as usize;
                let end = start + self.width as usize;
                let count = self.cells[start..end].iter().filter(|cell| **cell).count();
                count as f64 * cell_area(row, self.height)
            })
            .sum();
        (covered / total).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_map_basics() {
        let mut map = CellMap::new(4, 3);
        assert_eq!(map.cell_count(), 12);
        assert_eq!(map.count_set(), 0);

        assert_eq!(map.set(3, 2, true), Some(false));
        assert_eq!(map.set(3, 2, true), Some(true));
        assert_eq!(map.set(4, 0, true), None);
        assert!(map.get(3, 2));
        assert!(!map.get(9, 9));

        let raster = map.to_byte_raster();
        assert_eq!(raster[11], 1);
        assert_eq!(raster.iter().map(|b| *b as usize).sum::<usize>(), 1);

        let (pos, value) = map.iter_cells().last().unwrap();
        assert_eq!(pos, UVec2::new(3, 2));
        assert!(value);
    }

    #[test]
    fn area_weighting_favours_the_equator() {
        let mut equator = CellMap::new(20, 10);
        equator.set(0, 5, true);
        let mut polar = CellMap::new(20, 10);
        polar.set(0, 1, true);
        assert!(equator.area_weighted_fraction() > polar.area_weighted_fraction());

        let expected = 1.0 / total_grid_area(20, 10);
        assert!((equator.area_weighted_fraction() - expected).abs() < 1e-12);

        assert_eq!(CellMap::filled(20, 10, true).area_weighted_fraction(), 1.0);
        assert_eq!(CellMap::new(20, 10).area_weighted_fraction(), 0.0);
    }

    #[test]
    fn row_major_constructor_checks_length() {
        assert!(CellMap::from_row_major(2, 2, vec![true; 3]).is_none());
        let map = CellMap::from_row_major(2, 2, vec![false, true, false, false]).unwrap();
        assert!(map.get(1, 0));
    }
}
