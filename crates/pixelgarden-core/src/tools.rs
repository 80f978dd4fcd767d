//! Tool system for the pixel canvas.

use crate::color::Color;
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Draw,
    Erase,
    Pipette,
    Move,
}

impl ToolKind {
    /// Whether a press with this tool opens a stroke.
    pub fn paints(self) -> bool {
        matches!(self, ToolKind::Draw | ToolKind::Erase)
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Draw => "Draw",
            ToolKind::Erase => "Erase",
            ToolKind::Pipette => "Pipette",
            ToolKind::Move => "Move",
        }
    }
}

/// Brush diameters in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BrushSize {
    #[default]
    One,
    Two,
    Four,
    Eight,
}

impl BrushSize {
    pub fn diameter(self) -> u32 {
        match self {
            BrushSize::One => 1,
            BrushSize::Two => 2,
            BrushSize::Four => 4,
            BrushSize::Eight => 8,
        }
    }

    /// Cycle to the next brush size, wrapping back to one cell.
    pub fn next(self) -> Self {
        match self {
            BrushSize::One => BrushSize::Two,
            BrushSize::Two => BrushSize::Four,
            BrushSize::Four => BrushSize::Eight,
            BrushSize::Eight => BrushSize::One,
        }
    }

    /// Nearest size not larger than `diameter`, at least one cell.
    pub fn from_diameter(diameter: u32) -> Self {
        match diameter {
            0..=1 => BrushSize::One,
            2..=3 => BrushSize::Two,
            4..=7 => BrushSize::Four,
            _ => BrushSize::Eight,
        }
    }
}

/// Manages the current tool, brush and color.
#[derive(Debug, Clone)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Color used by the draw tool.
    pub selected_color: Color,
    /// Current brush size.
    pub brush_size: BrushSize,
    /// Color the eraser paints with.
    pub background: Color,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self {
            current_tool: ToolKind::default(),
            selected_color: Color::WHITE,
            brush_size: BrushSize::default(),
            background: Color::BLACK,
        }
    }
}

impl ToolManager {
    /// Create a new tool manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current tool.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if tool != self.current_tool {
            log::debug!("Switching tool to {}", tool.name());
            self.current_tool = tool;
        }
    }

    /// Cycle through brush sizes in increasing order.
    pub fn rotate_brush_size(&mut self) -> BrushSize {
        self.brush_size = self.brush_size.next();
        self.brush_size
    }

    /// Color a stroke started with `tool` paints with.
    pub fn stroke_color(&self, tool: ToolKind) -> Color {
        match tool {
            ToolKind::Erase => self.background,
            _ => self.selected_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brush_cycle() {
        let mut tools = ToolManager::new();
        assert_eq!(tools.brush_size.diameter(), 1);
        assert_eq!(tools.rotate_brush_size().diameter(), 2);
        assert_eq!(tools.rotate_brush_size().diameter(), 4);
        assert_eq!(tools.rotate_brush_size().diameter(), 8);
        assert_eq!(tools.rotate_brush_size().diameter(), 1);
    }

    #[test]
    fn test_from_diameter() {
        assert_eq!(BrushSize::from_diameter(0), BrushSize::One);
        assert_eq!(BrushSize::from_diameter(3), BrushSize::Two);
        assert_eq!(BrushSize::from_diameter(8), BrushSize::Eight);
        assert_eq!(BrushSize::from_diameter(100), BrushSize::Eight);
    }

    #[test]
    fn test_stroke_color() {
        let mut tools = ToolManager::new();
        tools.selected_color = Color::from_rgb(1, 2, 3);
        assert_eq!(tools.stroke_color(ToolKind::Draw), Color::from_rgb(1, 2, 3));
        assert_eq!(tools.stroke_color(ToolKind::Erase), Color::BLACK);
    }

    #[test]
    fn test_paint_capable_tools() {
        assert!(ToolKind::Draw.paints());
        assert!(ToolKind::Erase.paints());
        assert!(!ToolKind::Pipette.paints());
        assert!(!ToolKind::Move.paints());
    }
}
