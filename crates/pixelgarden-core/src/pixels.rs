//! The local pixel store.

use crate::color::Color;
use crate::viewport::GridPos;
use thiserror::Error;

/// Default grid width in cells.
pub const DEFAULT_WIDTH: u32 = 1000;
/// Default grid height in cells.
pub const DEFAULT_HEIGHT: u32 = 1000;

/// Rejected wholesale replacement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Pixel data has {actual} cells, expected {width}x{height}")]
pub struct SizeMismatch {
    pub width: u32,
    pub height: u32,
    pub actual: usize,
}

/// A fixed-size grid of colors stored row-major.
///
/// Reads and writes outside the grid are no-ops rather than errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelStore {
    width: u32,
    height: u32,
    data: Vec<Color>,
}

impl Default for PixelStore {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, Color::BLACK)
    }
}

impl PixelStore {
    /// Create a store filled with `background`.
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self {
            width,
            height,
            data: vec![background; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether `pos` addresses a cell of this grid.
    pub fn contains(&self, pos: GridPos) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && (pos.x as u32) < self.width
            && (pos.y as u32) < self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        self.contains(pos)
            .then(|| pos.y as usize * self.width as usize + pos.x as usize)
    }

    /// Color at `pos`, or `None` when out of bounds.
    pub fn get(&self, pos: GridPos) -> Option<Color> {
        self.index(pos).map(|i| self.data[i])
    }

    /// Write `color` at `pos`. Returns false and leaves the store untouched
    /// when `pos` is out of bounds.
    pub fn set(&mut self, pos: GridPos, color: Color) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.data[i] = color;
                true
            }
            None => false,
        }
    }

    /// Swap in a whole new grid, possibly of a different size.
    pub fn replace(&mut self, width: u32, height: u32, data: Vec<Color>) -> Result<(), SizeMismatch> {
        if data.len() != width as usize * height as usize {
            return Err(SizeMismatch { width, height, actual: data.len() });
        }
        self.width = width;
        self.height = height;
        self.data = data;
        Ok(())
    }

    /// Overwrite every cell with `color`.
    pub fn fill(&mut self, color: Color) {
        self.data.fill(color);
    }

    /// Row-major cell data.
    pub fn as_slice(&self) -> &[Color] {
        &self.data
    }

    /// Iterate rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Color]> {
        self.data.chunks(self.width.max(1) as usize)
    }
}
