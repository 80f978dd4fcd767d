//! Edit events: one continuous stroke batched into a single submission.

use crate::color::Color;
use crate::viewport::GridPos;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An open stroke collecting the cells it touches.
#[derive(Debug, Clone)]
pub struct EditEvent {
    color: Color,
    cells: Vec<GridPos>,
    seen: HashSet<GridPos>,
}

impl EditEvent {
    /// Start a stroke painting with `color`.
    pub fn begin(color: Color) -> Self {
        Self {
            color,
            cells: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Cells recorded so far, in first-touch order.
    pub fn cells(&self) -> &[GridPos] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Record a touched cell. Returns false when the cell was already recorded.
    pub fn record(&mut self, pos: GridPos) -> bool {
        if !self.seen.insert(pos) {
            return false;
        }
        self.cells.push(pos);
        true
    }

    /// Close the stroke into its outgoing payload.
    pub fn finish(self) -> EditPayload {
        EditPayload {
            color: self.color,
            cells: self.cells,
        }
    }
}

/// A finished stroke as sent to `POST /queue_event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPayload {
    pub color: Color,
    #[serde(rename = "pixel_list")]
    pub cells: Vec<GridPos>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_idempotent() {
        let mut event = EditEvent::begin(Color::WHITE);
        assert!(event.record(GridPos::new(1, 1)));
        assert!(event.record(GridPos::new(2, 1)));
        assert!(!event.record(GridPos::new(1, 1)));
        assert_eq!(event.cells(), &[GridPos::new(1, 1), GridPos::new(2, 1)]);
    }

    #[test]
    fn test_empty_event_still_finishes() {
        let payload = EditEvent::begin(Color::BLACK).finish();
        assert!(payload.cells.is_empty());
        assert_eq!(payload.color, Color::BLACK);
    }

    #[test]
    fn test_payload_wire_format() {
        let mut event = EditEvent::begin(Color::from_rgb(0xff, 0x88, 0x00));
        event.record(GridPos::new(5, 7));
        let json = serde_json::to_value(event.finish()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "color": "#ff8800", "pixel_list": [{ "x": 5, "y": 7 }] })
        );
    }
}
