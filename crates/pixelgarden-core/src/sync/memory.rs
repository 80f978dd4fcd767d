//! In-process canvas server.

use super::wire::{FullImage, parse_snapshot};
use super::{RemoteService, SyncError, SyncResult};
use crate::color::Color;
use crate::event::EditPayload;
use crate::pixels::PixelStore;
use crate::viewport::GridPos;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A [`RemoteService`] that keeps the authoritative grid in memory.
///
/// Snapshots go through the same JSON encoding as the HTTP server. Failures
/// can be switched on to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    store: Mutex<PixelStore>,
    received: Mutex<Vec<EditPayload>>,
    override_body: Mutex<Option<String>>,
    fail_polls: AtomicBool,
    fail_submits: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryRemote {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self::with_store(PixelStore::new(width, height, background))
    }

    pub fn with_store(store: PixelStore) -> Self {
        Self {
            store: Mutex::new(store),
            ..Self::default()
        }
    }

    /// Change one authoritative pixel, as another client would.
    pub fn set_pixel(&self, pos: GridPos, color: Color) -> bool {
        lock(&self.store).set(pos, color)
    }

    pub fn pixel(&self, pos: GridPos) -> Option<Color> {
        lock(&self.store).get(pos)
    }

    /// Copy of the authoritative grid.
    pub fn store(&self) -> PixelStore {
        lock(&self.store).clone()
    }

    /// Payloads accepted so far, in arrival order.
    pub fn received(&self) -> Vec<EditPayload> {
        lock(&self.received).clone()
    }

    pub fn fail_polls(&self, fail: bool) {
        self.fail_polls.store(fail, Ordering::SeqCst);
    }

    pub fn fail_submits(&self, fail: bool) {
        self.fail_submits.store(fail, Ordering::SeqCst);
    }

    /// Answer polls with a fixed body instead of the grid.
    pub fn respond_with(&self, body: Option<String>) {
        *lock(&self.override_body) = body;
    }

    fn body(&self) -> SyncResult<String> {
        if let Some(body) = lock(&self.override_body).clone() {
            return Ok(body);
        }
        let image = FullImage::from_store(&lock(&self.store));
        serde_json::to_string(&image).map_err(|e| SyncError::Network(e.to_string()))
    }
}

impl RemoteService for MemoryRemote {
    fn poll_full_image(&self) -> SyncResult<PixelStore> {
        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(SyncError::Status {
                status: 503,
                body: "poll refused".to_string(),
            });
        }
        Ok(parse_snapshot(&self.body()?)?)
    }

    fn queue_event(&self, payload: &EditPayload) -> SyncResult<()> {
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(SyncError::Network("connection reset".to_string()));
        }
        {
            let mut store = lock(&self.store);
            for &cell in &payload.cells {
                store.set(cell, payload.color);
            }
        }
        lock(&self.received).push(payload.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_applies_and_skips_out_of_bounds() {
        let remote = MemoryRemote::new(3, 3, Color::BLACK);
        let payload = EditPayload {
            color: Color::WHITE,
            cells: vec![GridPos::new(1, 1), GridPos::new(5, 5), GridPos::new(-1, 0)],
        };
        remote.queue_event(&payload).unwrap();
        assert_eq!(remote.pixel(GridPos::new(1, 1)), Some(Color::WHITE));
        assert_eq!(remote.received(), vec![payload]);
    }

    #[test]
    fn test_poll_roundtrips_through_json() {
        let remote = MemoryRemote::new(3, 2, Color::BLACK);
        remote.set_pixel(GridPos::new(2, 1), Color::WHITE);
        assert_eq!(remote.poll_full_image().unwrap(), remote.store());
    }

    #[test]
    fn test_failure_injection() {
        let remote = MemoryRemote::new(1, 1, Color::BLACK);
        remote.fail_polls(true);
        assert!(matches!(remote.poll_full_image(), Err(SyncError::Status { status: 503, .. })));
        remote.fail_polls(false);
        assert!(remote.poll_full_image().is_ok());
    }
}
