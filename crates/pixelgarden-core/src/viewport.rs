//! Viewport module for pan/zoom transforms between device pixels and grid cells.

use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Scale that corresponds to "100%" in the camera label.
pub const DEFAULT_SCALE: u32 = 10;
/// Extra cells rendered past the viewport edge to tolerate rounding.
pub const RENDER_MARGIN: i32 = 2;

/// An integer cell coordinate, either on the grid or on the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Floor a continuous point to the cell containing it.
    pub fn floor(point: Point) -> Self {
        Self {
            x: point.x.floor() as i32,
            y: point.y.floor() as i32,
        }
    }

    /// Translate by `(dx, dy)`, saturating at the `i32` range.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

/// Half-open rectangle of grid cells, `min` inclusive and `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub min: GridPos,
    pub max: GridPos,
}

impl CellRange {
    /// Number of cells covered.
    pub fn len(&self) -> usize {
        let w = (self.max.x - self.min.x).max(0) as usize;
        let h = (self.max.y - self.min.y).max(0) as usize;
        w * h
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate row by row over every cell in the range.
    pub fn iter(&self) -> impl Iterator<Item = GridPos> + '_ {
        (self.min.y..self.max.y)
            .flat_map(move |y| (self.min.x..self.max.x).map(move |x| GridPos::new(x, y)))
    }
}

/// Viewport manages the camera over the pixel grid.
///
/// The camera offset is continuous so sub-cell pans accumulate, but only its
/// floored part is used as the translation between grid and screen cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    /// Camera offset in grid cells, never negative.
    pub offset: Vec2,
    /// Device pixels per grid cell.
    pub scale: u32,
    /// Scale shown as 100% in the label.
    pub default_scale: u32,
    /// Minimum allowed scale.
    pub min_scale: u32,
    /// Maximum allowed scale.
    pub max_scale: u32,
    /// Size of the drawing surface in device pixels.
    pub size: Size,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: DEFAULT_SCALE,
            default_scale: DEFAULT_SCALE,
            min_scale: 5,
            max_scale: 100,
            size: Size::new(1280.0, 800.0),
        }
    }
}

impl Viewport {
    /// Create a new viewport with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// The floored camera offset applied as translation.
    pub fn camera_cell(&self) -> GridPos {
        GridPos::floor(self.offset.to_point())
    }

    fn scale_f64(&self) -> f64 {
        f64::from(self.scale)
    }

    /// Viewport extent measured in cells at the current scale.
    pub fn cells_across(&self) -> Vec2 {
        Vec2::new(self.size.width / self.scale_f64(), self.size.height / self.scale_f64())
    }

    /// Convert a device pixel to the screen cell under it.
    pub fn device_to_screen(&self, device: Point) -> GridPos {
        let s = self.scale_f64();
        GridPos::floor(Point::new(device.x / s, device.y / s))
    }

    /// Convert a screen cell to the grid cell it shows.
    pub fn screen_to_grid(&self, screen: GridPos) -> GridPos {
        let camera = self.camera_cell();
        screen.offset(camera.x, camera.y)
    }

    /// Convert a device pixel to the grid cell under it.
    pub fn device_to_grid(&self, device: Point) -> GridPos {
        self.screen_to_grid(self.device_to_screen(device))
    }

    /// Convert a grid cell to its screen cell.
    pub fn grid_to_screen(&self, cell: GridPos) -> GridPos {
        let camera = self.camera_cell();
        cell.offset(-camera.x, -camera.y)
    }

    /// Whether a screen cell lies inside the viewport.
    pub fn is_on_screen(&self, screen: GridPos) -> bool {
        let across = self.cells_across();
        screen.x >= 0
            && screen.y >= 0
            && f64::from(screen.x) < across.x
            && f64::from(screen.y) < across.y
    }

    /// Device-pixel rectangle `(x, y, w, h)` covered by a screen cell.
    pub fn cell_rect(&self, screen: GridPos) -> (f64, f64, f64, f64) {
        let s = self.scale_f64();
        (f64::from(screen.x) * s, f64::from(screen.y) * s, s, s)
    }

    /// Grid cells that may be visible, inflated by [`RENDER_MARGIN`] and
    /// clipped to a grid of `grid_size` cells.
    pub fn visible_cells(&self, grid_size: (u32, u32)) -> CellRange {
        let camera = self.camera_cell();
        let far = self.offset + self.cells_across();
        let max_x = (far.x.floor() as i32 + RENDER_MARGIN).min(clamp_dim(grid_size.0));
        let max_y = (far.y.floor() as i32 + RENDER_MARGIN).min(clamp_dim(grid_size.1));
        CellRange {
            min: GridPos::new(camera.x.max(0), camera.y.max(0)),
            max: GridPos::new(max_x.max(0), max_y.max(0)),
        }
    }

    /// Pan the camera by a delta in device pixels.
    ///
    /// The offset never goes negative. Moving away from the origin stops
    /// where the far viewport edge meets the far grid edge. A camera that a
    /// zoom-out left past that bound keeps its position on any axis it is
    /// not being moved back along, and moves back smoothly on the others.
    pub fn pan(&mut self, delta: Vec2, grid_size: (u32, u32)) {
        let candidate = self.offset - delta / self.scale_f64();
        let across = self.cells_across();
        self.offset = Vec2::new(
            clamp_axis(self.offset.x, candidate.x, f64::from(grid_size.0) - across.x),
            clamp_axis(self.offset.y, candidate.y, f64::from(grid_size.1) - across.y),
        );
    }

    /// Change the scale by `delta`, clamped to `[min_scale, max_scale]`.
    ///
    /// The camera offset is left where it is.
    pub fn zoom(&mut self, delta: i32) {
        let new_scale = (i64::from(self.scale) + i64::from(delta))
            .clamp(i64::from(self.min_scale), i64::from(self.max_scale));
        self.scale = new_scale as u32;
    }

    /// Set the viewport size in device pixels.
    pub fn resize(&mut self, size: Size) {
        self.size = size;
    }

    /// Zoom relative to the default scale, in whole percent.
    pub fn zoom_percentage(&self) -> u32 {
        self.scale * 100 / self.default_scale.max(1)
    }

    /// Camera label text, e.g. `"12 | 40 (150%)"`.
    pub fn label(&self) -> String {
        let camera = self.camera_cell();
        format!("{} | {} ({}%)", camera.x, camera.y, self.zoom_percentage())
    }

    /// Reset camera to the origin and the default scale.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.scale = self.default_scale;
    }
}

/// Clamp one axis of a pan to `[0, far]`, where `far` is relaxed to the
/// current position while the camera sits past it.
fn clamp_axis(current: f64, candidate: f64, far: f64) -> f64 {
    let upper = far.max(current.min(candidate)).max(0.0);
    candidate.clamp(0.0, upper)
}

fn clamp_dim(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
