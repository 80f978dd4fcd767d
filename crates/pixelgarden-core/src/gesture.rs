//! Touch gesture interpretation for one-finger pan and two-finger pinch.
//!
//! Touch coordinates are absolute, so the first sample of a gesture has no
//! meaningful predecessor. Both tracks hold an "unset" sample after a reset
//! and report no delta until two real samples exist.

use kurbo::{Point, Vec2};

/// Tracks single-finger motion between consecutive touch samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionTracker {
    previous: Option<Point>,
    current: Option<Point>,
}

impl MotionTracker {
    pub fn reset(&mut self) {
        self.previous = None;
        self.current = None;
    }

    /// Push a new finger position.
    pub fn update(&mut self, pos: Point) {
        self.previous = self.current;
        self.current = Some(pos);
    }

    /// Movement since the previous sample, zero until two samples exist.
    pub fn motion(&self) -> Vec2 {
        match (self.previous, self.current) {
            (Some(previous), Some(current)) => current - previous,
            _ => Vec2::ZERO,
        }
    }
}

/// Tracks the distance between two fingers during a pinch.
///
/// A distance of zero is the unset sentinel.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinchTracker {
    previous: f64,
    current: f64,
}

impl PinchTracker {
    pub fn reset(&mut self) {
        self.previous = 0.0;
        self.current = 0.0;
    }

    /// Push a new pair of finger positions.
    pub fn update(&mut self, first: Point, second: Point) {
        self.previous = self.current;
        self.current = first.distance(second);
    }

    /// Change in finger distance since the previous sample.
    pub fn zoom_delta(&self) -> f64 {
        if self.previous == 0.0 || self.current == 0.0 {
            return 0.0;
        }
        self.current - self.previous
    }
}

/// Both gesture tracks, reset together at gesture boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct GestureInterpreter {
    pub motion: MotionTracker,
    pub pinch: PinchTracker,
}

impl GestureInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear both tracks. Call on touch start, end and cancel.
    pub fn reset(&mut self) {
        self.motion.reset();
        self.pinch.reset();
    }

    /// Feed a one-finger sample and return the pan delta it produces.
    pub fn track_motion(&mut self, pos: Point) -> Vec2 {
        self.motion.update(pos);
        self.motion.motion()
    }

    /// Feed a two-finger sample and return the distance change it produces.
    pub fn track_pinch(&mut self, first: Point, second: Point) -> f64 {
        self.pinch.update(first, second);
        self.pinch.zoom_delta()
    }
}
