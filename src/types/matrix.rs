//! Rectangular boolean grid and the extracted seed

use serde::Serialize;
use crate::types::BoundsWarning;

/// Rectangular grid of cells, stored row-major. Every row has `cols` cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl Matrix {
    /// All-dead grid
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![false; rows * cols],
        }
    }

    /// Build from rows. Returns None for an empty or ragged input.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Option<Self> {
        let cols = rows.first()?.len();
        if cols == 0 || rows.iter().any(|r| r.len() != cols) {
            return None;
        }
        let row_count = rows.len();
        let cells = rows.into_iter().flatten().collect();
        Some(Self {
            rows: row_count,
            cols,
            cells,
        })
    }

    /// Place live cells at `(row, col)` on an otherwise dead grid.
    /// Coordinates outside the grid are ignored.
    pub fn with_live(rows: usize, cols: usize, live: &[(usize, usize)]) -> Self {
        let mut m = Self::new(rows, cols);
        for &(r, c) in live {
            m.set(r, c, true);
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cell state; out-of-range coordinates read as dead
    pub fn get(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols && self.cells[row * self.cols + col]
    }

    /// Set a cell; out-of-range coordinates are ignored
    pub fn set(&mut self, row: usize, col: usize, alive: bool) {
        if row < self.rows && col < self.cols {
            self.cells[row * self.cols + col] = alive;
        }
    }

    /// Number of live cells
    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Coordinates of all live cells, row-major
    pub fn live_cells(&self) -> Vec<(usize, usize)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(i, _)| (i / self.cols, i % self.cols))
            .collect()
    }

    /// Row-major cell slice
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [bool] {
        &mut self.cells
    }

    /// Copy back into nested rows
    pub fn to_rows(&self) -> Vec<Vec<bool>> {
        if self.cols == 0 {
            return vec![Vec::new(); self.rows];
        }
        self.cells.chunks(self.cols).map(|r| r.to_vec()).collect()
    }

    /// Same dimensions as `other`
    pub fn same_shape(&self, other: &Matrix) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }
}

impl std::fmt::Display for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cols == 0 {
            return Ok(());
        }
        for row in self.cells.chunks(self.cols) {
            let line: String = row.iter().map(|c| if *c { '#' } else { '.' }).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// A seed recovered from generated text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pattern {
    pub matrix: Matrix,
    pub iterations: u64,
    /// Advisory bounds the seed falls outside of
    pub warnings: Vec<BoundsWarning>,
}
