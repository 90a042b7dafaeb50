//! Board module - grid storage, collision testing, line clears
//!
//! The playfield is 10x20 visible cells with a 2-row hidden buffer on top,
//! stored as a flat row-major array. Coordinates: (x, y) with x in 0..10
//! left to right and y in 0..22 top to bottom; row 0 is the top buffer row.
//! Every query outside the grid reads as blocked, so collision checks at the
//! walls and the floor need no special cases.

use arrayvec::ArrayVec;

use crate::core::pieces::shape;
use crate::types::{Cell, PieceKind, Rotation, BOARD_TOTAL_HEIGHT, BOARD_WIDTH};

const BOARD_SIZE: usize = (BOARD_WIDTH as usize) * (BOARD_TOTAL_HEIGHT as usize);

/// The game board - flat array storage including the hidden buffer rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [Cell; BOARD_SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [None; BOARD_SIZE],
        }
    }

    #[inline(always)]
    fn index(x: i8, y: i8) -> Option<usize> {
        if x < 0 || x >= BOARD_WIDTH as i8 || y < 0 || y >= BOARD_TOTAL_HEIGHT as i8 {
            return None;
        }
        Some((y as usize) * (BOARD_WIDTH as usize) + (x as usize))
    }

    /// Cell at (x, y); None when out of bounds.
    pub fn cell(&self, x: i8, y: i8) -> Option<Cell> {
        Self::index(x, y).map(|idx| self.cells[idx])
    }

    /// True iff (x, y) is in bounds and empty. Walls, floor and anything
    /// outside the grid all read as closed.
    pub fn is_open(&self, x: i8, y: i8) -> bool {
        matches!(self.cell(x, y), Some(None))
    }

    /// True iff (x, y) is blocked: occupied or out of bounds.
    pub fn is_occupied(&self, x: i8, y: i8) -> bool {
        !self.is_open(x, y)
    }

    /// True iff every mino of the piece maps to an open cell.
    pub fn can_place(&self, kind: PieceKind, rotation: Rotation, x: i8, y: i8) -> bool {
        shape(kind, rotation)
            .iter()
            .all(|&(mx, my)| self.is_open(x + mx, y + my))
    }

    /// Write the piece's minos into the grid.
    ///
    /// Precondition: `can_place` holds. A violation means the engine's
    /// sequencing is broken, so this asserts instead of recovering.
    pub fn commit(&mut self, kind: PieceKind, rotation: Rotation, x: i8, y: i8) {
        for &(mx, my) in &shape(kind, rotation) {
            let idx = Self::index(x + mx, y + my)
                .unwrap_or_else(|| panic!("commit out of bounds at ({}, {})", x + mx, y + my));
            assert!(self.cells[idx].is_none(), "commit over occupied cell");
            self.cells[idx] = Some(kind);
        }
    }

    fn is_row_full(&self, y: usize) -> bool {
        let start = y * BOARD_WIDTH as usize;
        let end = start + BOARD_WIDTH as usize;
        self.cells[start..end].iter().all(|cell| cell.is_some())
    }

    /// Clear all full rows in one pass and return their indices, top to
    /// bottom. Handles 0-4 simultaneous clears including non-contiguous
    /// rows: surviving rows are compacted downward with a two-pointer sweep.
    pub fn clear_full_rows(&mut self) -> ArrayVec<usize, 4> {
        let mut cleared: ArrayVec<usize, 4> = ArrayVec::new();
        let width = BOARD_WIDTH as usize;
        let mut write_y = BOARD_TOTAL_HEIGHT as usize;

        for read_y in (0..BOARD_TOTAL_HEIGHT as usize).rev() {
            if self.is_row_full(read_y) {
                cleared.push(read_y);
            } else {
                write_y -= 1;
                if write_y != read_y {
                    let src = read_y * width;
                    let dst = write_y * width;
                    self.cells.copy_within(src..src + width, dst);
                }
            }
        }

        for cell in &mut self.cells[..write_y * width] {
            *cell = None;
        }

        cleared.reverse();
        cleared
    }

    /// Lowest y at which the piece can rest if dropped from (x, y).
    pub fn drop_y(&self, kind: PieceKind, rotation: Rotation, x: i8, y: i8) -> i8 {
        let mut rest = y;
        while self.can_place(kind, rotation, x, rest + 1) {
            rest += 1;
        }
        rest
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Direct cell write, for tests that stage board layouts.
    #[cfg(test)]
    pub fn set(&mut self, x: i8, y: i8, cell: Cell) {
        if let Some(idx) = Self::index(x, y) {
            self.cells[idx] = cell;
        }
    }

    /// Fill an entire row, for tests.
    #[cfg(test)]
    pub fn fill_row(&mut self, y: usize, kind: PieceKind) {
        let start = y * BOARD_WIDTH as usize;
        for cell in &mut self.cells[start..start + BOARD_WIDTH as usize] {
            *cell = Some(kind);
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
