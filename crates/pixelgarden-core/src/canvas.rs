//! Canvas engine: camera, pixel store and the open stroke.

use crate::color::Color;
use crate::config::EngineConfig;
use crate::event::{EditEvent, EditPayload};
use crate::pixels::PixelStore;
use crate::surface::RenderSurface;
use crate::tools::{ToolKind, ToolManager};
use crate::viewport::{GridPos, Viewport};
use kurbo::{Point, Size, Vec2};

/// The single owner of camera state and of interactive pixel writes.
///
/// Every mutating operation takes the surface to repaint so the screen is
/// consistent with the store when the call returns.
#[derive(Debug, Clone)]
pub struct CanvasEngine {
    viewport: Viewport,
    pixels: PixelStore,
    /// Tool, color and brush selection.
    pub tools: ToolManager,
    stroke: Option<EditEvent>,
}

impl Default for CanvasEngine {
    fn default() -> Self {
        Self::with_config(&EngineConfig::default())
    }
}

impl CanvasEngine {
    /// Create an engine with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine from configuration.
    pub fn with_config(config: &EngineConfig) -> Self {
        let viewport = Viewport {
            scale: config.default_scale,
            default_scale: config.default_scale,
            min_scale: config.min_scale,
            max_scale: config.max_scale,
            ..Viewport::default()
        };
        let tools = ToolManager {
            selected_color: config.brush_color,
            brush_size: crate::tools::BrushSize::from_diameter(config.brush_size),
            background: config.background,
            ..ToolManager::default()
        };
        Self {
            viewport,
            pixels: PixelStore::new(config.grid_width, config.grid_height, config.background),
            tools,
            stroke: None,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn pixels(&self) -> &PixelStore {
        &self.pixels
    }

    /// The stroke currently being drawn, if any.
    pub fn open_stroke(&self) -> Option<&EditEvent> {
        self.stroke.as_ref()
    }

    /// Color new pixels are painted with right now.
    pub fn active_color(&self) -> Color {
        self.stroke
            .as_ref()
            .map_or(self.tools.selected_color, EditEvent::color)
    }

    /// Camera label text for the current position and zoom.
    pub fn camera_label(&self) -> String {
        self.viewport.label()
    }

    // --- Strokes ---

    /// Open a stroke for `tool`. Returns false when the tool does not paint
    /// or a stroke is already open.
    pub fn begin_stroke(&mut self, tool: ToolKind) -> bool {
        if !tool.paints() {
            return false;
        }
        self.begin_stroke_with(self.tools.stroke_color(tool))
    }

    /// Open a stroke painting with an explicit color.
    pub fn begin_stroke_with(&mut self, color: Color) -> bool {
        if self.stroke.is_some() {
            log::debug!("Ignoring stroke start while another stroke is open");
            return false;
        }
        self.stroke = Some(EditEvent::begin(color));
        true
    }

    /// Close the open stroke and hand back its payload.
    pub fn finish_stroke(&mut self) -> Option<EditPayload> {
        self.stroke.take().map(EditEvent::finish)
    }

    /// Paint a square brush of `diameter` cells centered on a device position.
    ///
    /// Cells outside the grid or already holding the active color are
    /// skipped. Each written cell is recorded into the open stroke and
    /// repainted on its own. Returns the number of cells written.
    pub fn paint_stroke(&mut self, surface: &mut dyn RenderSurface, device: Point, diameter: u32) -> usize {
        let half = (diameter / 2) as i32;
        let (lower, upper) = if half == 0 { (0, 1) } else { (-half, half) };
        let color = self.active_color();
        let cursor = self.viewport.device_to_screen(device);

        let mut written = 0;
        for dy in lower..upper {
            for dx in lower..upper {
                let cell = self.viewport.screen_to_grid(cursor.offset(dx, dy));
                match self.pixels.get(cell) {
                    None => continue,
                    Some(existing) if existing == color => continue,
                    Some(_) => {}
                }
                self.pixels.set(cell, color);
                if let Some(stroke) = self.stroke.as_mut() {
                    stroke.record(cell);
                }
                self.render_cell(surface, cell);
                written += 1;
            }
        }
        written
    }

    /// Paint with the current brush size.
    pub fn paint_at(&mut self, surface: &mut dyn RenderSurface, device: Point) -> usize {
        let diameter = self.tools.brush_size.diameter();
        self.paint_stroke(surface, device, diameter)
    }

    /// Adopt the color under a device position as the selected color.
    ///
    /// Returns the new color when it changed.
    pub fn sample_color(&mut self, device: Point) -> Option<Color> {
        let cell = self.viewport.device_to_grid(device);
        let color = self.pixels.get(cell)?;
        if color == self.tools.selected_color {
            return None;
        }
        self.tools.selected_color = color;
        Some(color)
    }

    // --- Camera ---

    /// Pan by a delta in device pixels and repaint.
    pub fn pan(&mut self, surface: &mut dyn RenderSurface, delta: Vec2) {
        self.viewport.pan(delta, self.pixels.size());
        self.full_render(surface);
    }

    /// Change the scale by `delta` and repaint.
    pub fn zoom(&mut self, surface: &mut dyn RenderSurface, delta: i32) {
        self.viewport.zoom(delta);
        self.full_render(surface);
    }

    /// Adopt a new surface size and repaint.
    pub fn resize(&mut self, surface: &mut dyn RenderSurface, size: Size) {
        log::debug!("Viewport resized to {}x{}", size.width, size.height);
        self.viewport.resize(size);
        self.full_render(surface);
    }

    // --- Store replacement ---

    /// Swap in a new pixel store and repaint. Used by the sync path only.
    pub fn replace_pixels(&mut self, surface: &mut dyn RenderSurface, pixels: PixelStore) {
        self.pixels = pixels;
        self.full_render(surface);
    }

    /// Copy of the grid for export.
    pub fn snapshot(&self) -> PixelStore {
        self.pixels.clone()
    }

    // --- Rendering ---

    /// Repaint one grid cell. Returns false when it is off-grid or off-screen.
    pub fn render_cell(&self, surface: &mut dyn RenderSurface, cell: GridPos) -> bool {
        let Some(color) = self.pixels.get(cell) else {
            return false;
        };
        let screen = self.viewport.grid_to_screen(cell);
        if !self.viewport.is_on_screen(screen) {
            return false;
        }
        let (x, y, w, h) = self.viewport.cell_rect(screen);
        surface.fill_rect(x, y, w, h, color);
        true
    }

    /// Clear the surface and repaint every visible cell.
    ///
    /// Work is proportional to the visible cells, never to the grid size.
    /// Returns the number of cells painted.
    pub fn full_render(&self, surface: &mut dyn RenderSurface) -> usize {
        let size = surface.size();
        surface.fill_rect(0.0, 0.0, size.width, size.height, self.tools.background);
        self.viewport
            .visible_cells(self.pixels.size())
            .iter()
            .filter(|&cell| self.render_cell(surface, cell))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::PixelBuffer;

    fn engine_and_surface() -> (CanvasEngine, PixelBuffer) {
        let mut engine = CanvasEngine::new();
        let mut surface = PixelBuffer::new(200, 100);
        engine.resize(&mut surface, Size::new(200.0, 100.0));
        engine.tools.selected_color = Color::WHITE;
        (engine, surface)
    }

    #[test]
    fn test_paint_single_cell() {
        let (mut engine, mut surface) = engine_and_surface();
        assert!(engine.begin_stroke(ToolKind::Draw));
        surface.reset_fill_count();

        let written = engine.paint_stroke(&mut surface, Point::new(25.0, 35.0), 1);
        assert_eq!(written, 1);
        assert_eq!(engine.pixels().get(GridPos::new(2, 3)), Some(Color::WHITE));
        // Incremental: exactly one fill for one cell
        assert_eq!(surface.fill_count(), 1);
        assert_eq!(surface.pixel(25, 35), Some(Color::WHITE));

        let payload = engine.finish_stroke().unwrap();
        assert_eq!(payload.cells, vec![GridPos::new(2, 3)]);
        assert_eq!(payload.color, Color::WHITE);
    }

    #[test]
    fn test_paint_even_brush_is_half_open() {
        let (mut engine, mut surface) = engine_and_surface();
        engine.begin_stroke(ToolKind::Draw);
        let written = engine.paint_stroke(&mut surface, Point::new(55.0, 55.0), 2);
        assert_eq!(written, 4);
        let payload = engine.finish_stroke().unwrap();
        assert_eq!(
            payload.cells,
            vec![GridPos::new(4, 4), GridPos::new(5, 4), GridPos::new(4, 5), GridPos::new(5, 5)]
        );
    }

    #[test]
    fn test_paint_skips_matching_and_out_of_bounds() {
        let (mut engine, mut surface) = engine_and_surface();
        engine.begin_stroke(ToolKind::Draw);
        // Brush of 4 at the origin reaches two cells into negative space
        assert_eq!(engine.paint_stroke(&mut surface, Point::new(0.0, 0.0), 4), 4);
        // Second pass over the same cells writes nothing
        assert_eq!(engine.paint_stroke(&mut surface, Point::new(0.0, 0.0), 4), 0);
        assert_eq!(engine.finish_stroke().unwrap().cells.len(), 4);
    }

    #[test]
    fn test_paint_respects_camera() {
        let (mut engine, mut surface) = engine_and_surface();
        engine.pan(&mut surface, Vec2::new(-30.0, -10.0));
        engine.begin_stroke(ToolKind::Draw);
        engine.paint_stroke(&mut surface, Point::new(25.0, 35.0), 1);
        assert_eq!(engine.finish_stroke().unwrap().cells, vec![GridPos::new(5, 4)]);
    }

    #[test]
    fn test_empty_stroke_still_finishes() {
        let (mut engine, mut surface) = engine_and_surface();
        engine.tools.selected_color = Color::BLACK;
        engine.begin_stroke(ToolKind::Draw);
        assert_eq!(engine.paint_stroke(&mut surface, Point::new(5.0, 5.0), 1), 0);
        let payload = engine.finish_stroke().unwrap();
        assert!(payload.cells.is_empty());
    }

    #[test]
    fn test_only_one_open_stroke() {
        let (mut engine, _) = engine_and_surface();
        assert!(engine.begin_stroke(ToolKind::Draw));
        assert!(!engine.begin_stroke(ToolKind::Erase));
        assert_eq!(engine.active_color(), Color::WHITE);
        assert!(engine.finish_stroke().is_some());
        assert!(engine.finish_stroke().is_none());
    }

    #[test]
    fn test_erase_stroke_uses_background() {
        let (mut engine, mut surface) = engine_and_surface();
        engine.begin_stroke(ToolKind::Draw);
        engine.paint_stroke(&mut surface, Point::new(5.0, 5.0), 1);
        engine.finish_stroke();

        assert!(engine.begin_stroke(ToolKind::Erase));
        engine.paint_stroke(&mut surface, Point::new(5.0, 5.0), 1);
        let payload = engine.finish_stroke().unwrap();
        assert_eq!(payload.color, Color::BLACK);
        assert_eq!(engine.pixels().get(GridPos::new(0, 0)), Some(Color::BLACK));
    }

    #[test]
    fn test_sample_color() {
        let (mut engine, mut surface) = engine_and_surface();
        let green = Color::from_rgb(0, 255, 0);
        engine.tools.selected_color = green;
        engine.paint_stroke(&mut surface, Point::new(15.0, 15.0), 1);
        engine.tools.selected_color = Color::WHITE;

        let before = engine.pixels().clone();
        assert_eq!(engine.sample_color(Point::new(15.0, 15.0)), Some(green));
        assert_eq!(engine.tools.selected_color, green);
        // Same color again reports no change
        assert_eq!(engine.sample_color(Point::new(15.0, 15.0)), None);
        assert_eq!(engine.pixels(), &before);
    }

    #[test]
    fn test_full_render_is_bounded_by_viewport() {
        let (engine, mut surface) = engine_and_surface();
        let painted = engine.full_render(&mut surface);
        // Margin cells are visited but only the 20x10 on-screen cells are drawn
        assert_eq!(painted, 20 * 10);
        assert_eq!(engine.viewport().visible_cells(engine.pixels().size()).len(), 22 * 12);
    }

    #[test]
    fn test_zoom_clamps_and_repaints() {
        let (mut engine, mut surface) = engine_and_surface();
        surface.reset_fill_count();
        engine.zoom(&mut surface, 10_000);
        assert_eq!(engine.viewport().scale, 100);
        assert!(surface.fill_count() > 0);
    }

    #[test]
    fn test_replace_pixels_repaints() {
        let (mut engine, mut surface) = engine_and_surface();
        engine.replace_pixels(&mut surface, PixelStore::new(4, 4, Color::WHITE));
        assert_eq!(surface.pixel(35, 35), Some(Color::WHITE));
        assert_eq!(surface.pixel(45, 5), Some(Color::BLACK));
    }
}
