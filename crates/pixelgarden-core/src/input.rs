//! Input events and their mapping onto canvas operations.

use crate::canvas::CanvasEngine;
use crate::config::EngineConfig;
use crate::event::EditPayload;
use crate::gesture::GestureInterpreter;
use crate::surface::RenderSurface;
use crate::tools::ToolKind;
use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Pressed pointer buttons as a bit mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Buttons(pub u8);

impl Buttons {
    /// Runs the selected tool.
    pub const PRIMARY: Buttons = Buttons(1);
    /// Erases.
    pub const SECONDARY: Buttons = Buttons(2);
    /// Pans.
    pub const AUXILIARY: Buttons = Buttons(4);
    pub const NONE: Buttons = Buttons(0);

    pub fn contains(self, other: Buttons) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for Buttons {
    type Output = Buttons;

    fn bitor(self, rhs: Buttons) -> Buttons {
        Buttons(self.0 | rhs.0)
    }
}

/// Raw input delivered by the host window or page.
///
/// Positions are device pixels relative to the surface origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    PointerDown {
        position: Point,
        buttons: Buttons,
    },
    PointerMove {
        position: Point,
        /// Movement since the previous pointer event.
        movement: Vec2,
        buttons: Buttons,
    },
    PointerUp {
        position: Point,
        buttons: Buttons,
    },
    /// Positive deltas zoom in.
    Wheel {
        delta: f64,
    },
    TouchStart {
        touches: Vec<Point>,
    },
    TouchMove {
        touches: Vec<Point>,
    },
    TouchEnd,
    TouchCancel,
    Resize {
        size: Size,
    },
}

/// Routes input events to a [`CanvasEngine`].
#[derive(Debug, Clone)]
pub struct InputDispatcher {
    gestures: GestureInterpreter,
    /// Scale change per wheel notch.
    pub scale_step: u32,
}

impl Default for InputDispatcher {
    fn default() -> Self {
        Self::with_config(&EngineConfig::default())
    }
}

impl InputDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            gestures: GestureInterpreter::new(),
            scale_step: config.scale_step,
        }
    }

    pub fn gestures(&self) -> &GestureInterpreter {
        &self.gestures
    }

    /// Apply one input event.
    ///
    /// Returns the finished stroke when the event ends one; the caller hands
    /// it to the sync manager.
    pub fn handle(
        &mut self,
        engine: &mut CanvasEngine,
        surface: &mut dyn RenderSurface,
        event: InputEvent,
    ) -> Option<EditPayload> {
        match event {
            InputEvent::PointerDown { position, buttons } => {
                self.pointer_down(engine, surface, position, buttons);
                None
            }
            InputEvent::PointerMove { position, movement, buttons } => {
                self.pointer_move(engine, surface, position, movement, buttons);
                None
            }
            InputEvent::PointerUp { .. } => engine.finish_stroke(),
            InputEvent::Wheel { delta } => {
                let step = self.scale_step as i32;
                if delta > 0.0 {
                    engine.zoom(surface, step);
                } else if delta < 0.0 {
                    engine.zoom(surface, -step);
                }
                None
            }
            InputEvent::TouchStart { touches } => {
                self.gestures.reset();
                let tool = engine.tools.current_tool;
                if tool.paints() {
                    engine.begin_stroke(tool);
                } else if tool == ToolKind::Pipette {
                    if let Some(&touch) = touches.first() {
                        engine.sample_color(touch);
                    }
                }
                None
            }
            InputEvent::TouchMove { touches } => {
                self.touch_move(engine, surface, &touches);
                None
            }
            InputEvent::TouchEnd | InputEvent::TouchCancel => {
                self.gestures.reset();
                engine.finish_stroke()
            }
            InputEvent::Resize { size } => {
                engine.resize(surface, size);
                None
            }
        }
    }

    fn pointer_down(
        &mut self,
        engine: &mut CanvasEngine,
        surface: &mut dyn RenderSurface,
        position: Point,
        buttons: Buttons,
    ) {
        let tool = engine.tools.current_tool;
        if buttons.contains(Buttons::PRIMARY) {
            if tool.paints() {
                engine.begin_stroke(tool);
                engine.paint_at(surface, position);
            } else if tool == ToolKind::Pipette {
                engine.sample_color(position);
            }
        }
        if buttons.contains(Buttons::SECONDARY) {
            engine.begin_stroke(ToolKind::Erase);
            engine.paint_at(surface, position);
        }
    }

    fn pointer_move(
        &mut self,
        engine: &mut CanvasEngine,
        surface: &mut dyn RenderSurface,
        position: Point,
        movement: Vec2,
        buttons: Buttons,
    ) {
        let tool = engine.tools.current_tool;
        let primary = buttons.contains(Buttons::PRIMARY);
        let painting = (primary && tool.paints()) || buttons.contains(Buttons::SECONDARY);
        if painting && engine.open_stroke().is_some() {
            engine.paint_at(surface, position);
        }
        let panning = (primary && tool == ToolKind::Move) || buttons.contains(Buttons::AUXILIARY);
        if panning && movement != Vec2::ZERO {
            engine.pan(surface, movement);
        }
    }

    fn touch_move(&mut self, engine: &mut CanvasEngine, surface: &mut dyn RenderSurface, touches: &[Point]) {
        let tool = engine.tools.current_tool;
        match touches {
            [touch] => {
                if tool.paints() {
                    engine.paint_at(surface, *touch);
                } else if tool == ToolKind::Move {
                    let motion = self.gestures.track_motion(*touch);
                    if motion != Vec2::ZERO {
                        engine.pan(surface, motion);
                    }
                }
            }
            [first, second, ..] if tool == ToolKind::Move => {
                let delta = self.gestures.track_pinch(*first, *second);
                if delta > 0.0 {
                    engine.zoom(surface, 1);
                } else if delta < 0.0 {
                    engine.zoom(surface, -1);
                }
            }
            _ => {}
        }
    }
}
