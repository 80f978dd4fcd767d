//! Wire types for the canvas server's HTTP endpoints.

use crate::color::Color;
use crate::pixels::PixelStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::event::EditPayload;

/// Path of the full-image endpoint.
pub const POLL_FULL_IMAGE_PATH: &str = "poll_full_image";
/// Path of the edit submission endpoint.
pub const QUEUE_EVENT_PATH: &str = "queue_event";

/// A snapshot that cannot be turned into a pixel store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("Malformed snapshot: {0}")]
    Malformed(String),
    #[error("Snapshot has {actual} rows, expected {expected}")]
    RowCount { expected: u32, actual: usize },
    #[error("Snapshot row {row} has {actual} cells, expected {expected}")]
    RowLength { row: usize, expected: u32, actual: usize },
}

/// Response body of `GET /poll_full_image`.
///
/// `image` is indexed `[row][column]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullImage {
    pub size_x: u32,
    pub size_y: u32,
    pub image: Vec<Vec<Color>>,
}

impl FullImage {
    /// Encode a pixel store.
    pub fn from_store(store: &PixelStore) -> Self {
        Self {
            size_x: store.width(),
            size_y: store.height(),
            image: store.rows().take(store.height() as usize).map(<[Color]>::to_vec).collect(),
        }
    }

    /// Parse a response body. Missing fields and bad colors are malformed.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::Malformed(e.to_string()))
    }

    /// Check the declared size against the rows and flatten into a store.
    ///
    /// Rows are checked before any cell storage is allocated.
    pub fn into_store(self) -> Result<PixelStore, SnapshotError> {
        if self.image.len() != self.size_y as usize {
            return Err(SnapshotError::RowCount {
                expected: self.size_y,
                actual: self.image.len(),
            });
        }
        if let Some((row, cells)) = self
            .image
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != self.size_x as usize)
        {
            return Err(SnapshotError::RowLength {
                row,
                expected: self.size_x,
                actual: cells.len(),
            });
        }
        let data: Vec<Color> = self.image.into_iter().flatten().collect();
        let mut store = PixelStore::new(0, 0, Color::BLACK);
        store
            .replace(self.size_x, self.size_y, data)
            .map_err(|e| SnapshotError::Malformed(e.to_string()))?;
        Ok(store)
    }
}

/// Decode a full-image response body straight into a store.
pub fn parse_snapshot(json: &str) -> Result<PixelStore, SnapshotError> {
    FullImage::from_json(json)?.into_store()
}
