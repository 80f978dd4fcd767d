//! Synchronization with the canvas server.
//!
//! The server owns the authoritative grid and exposes two operations: a full
//! image poll and an edit submission. Requests run on a background worker
//! thread so the UI thread never blocks; their results come back as
//! [`SyncEvent`]s that the UI thread drains with [`SyncManager::poll_events`]
//! or applies with [`SyncManager::pump`].
//!
//! Local edits are applied optimistically at paint time. When a snapshot
//! arrives while a stroke is still open, the stroke's cells are re-applied
//! onto the snapshot before it replaces the local store, so unsent pixels do
//! not flicker away.

#[cfg(not(target_arch = "wasm32"))]
mod http;
mod memory;
pub mod wire;

#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpRemote;
pub use memory::MemoryRemote;
pub use wire::{FullImage, SnapshotError, parse_snapshot};

use crate::canvas::CanvasEngine;
use crate::event::{EditEvent, EditPayload};
use crate::pixels::PixelStore;
use crate::surface::RenderSurface;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
    #[error("Sync worker is not running: {0}")]
    Worker(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// The remote canvas service.
///
/// Calls block and are made from the sync worker thread only.
pub trait RemoteService: Send + Sync {
    /// Fetch the full authoritative grid.
    fn poll_full_image(&self) -> SyncResult<PixelStore>;

    /// Deliver a finished stroke.
    fn queue_event(&self, payload: &EditPayload) -> SyncResult<()>;
}

/// Events produced by the sync manager.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A snapshot arrived and has not been applied yet.
    SnapshotReceived(PixelStore),
    /// A snapshot replaced the local store.
    SnapshotApplied { width: u32, height: u32, reapplied: usize },
    /// A poll failed; the local store is unchanged.
    PollFailed { message: String },
    /// The server acknowledged a stroke.
    EditDelivered { cells: usize },
    /// A stroke could not be delivered and is dropped.
    EditFailed { cells: usize, message: String },
}

/// Requests currently outstanding on the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub pending_polls: usize,
    pub pending_submits: usize,
}

impl SyncStatus {
    pub fn is_polling(&self) -> bool {
        self.pending_polls > 0
    }

    pub fn is_queuing(&self) -> bool {
        self.pending_submits > 0
    }

    pub fn is_idle(&self) -> bool {
        !self.is_polling() && !self.is_queuing()
    }
}

/// Decides when the next periodic poll is due.
#[derive(Debug, Clone)]
pub struct PollTimer {
    interval: Duration,
    last_poll: Option<Instant>,
}

impl PollTimer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_poll: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a poll is due at `now`. The first check is always due.
    pub fn should_poll(&self, now: Instant) -> bool {
        match self.last_poll {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Record that a poll was started at `now`.
    pub fn mark(&mut self, now: Instant) {
        self.last_poll = Some(now);
    }
}

/// Re-apply an open stroke onto a freshly received store.
///
/// Returns the number of cells written. Cells outside the new store's
/// bounds are skipped.
pub fn reconcile(store: &mut PixelStore, stroke: Option<&EditEvent>) -> usize {
    let Some(stroke) = stroke else {
        return 0;
    };
    let color = stroke.color();
    stroke
        .cells()
        .iter()
        .filter(|&&cell| store.set(cell, color))
        .count()
}

/// Reconcile a snapshot against the engine's open stroke and swap it in.
///
/// Runs entirely on the caller's thread, so no input can interleave between
/// the reconciliation and the replacement.
pub fn apply_snapshot(
    engine: &mut CanvasEngine,
    surface: &mut dyn RenderSurface,
    mut snapshot: PixelStore,
) -> SyncEvent {
    let reapplied = reconcile(&mut snapshot, engine.open_stroke());
    let (width, height) = snapshot.size();
    if engine.pixels().size() != (width, height) {
        log::info!("Grid resized to {}x{} by snapshot", width, height);
    }
    engine.replace_pixels(surface, snapshot);
    log::debug!("Applied snapshot, re-applied {} unsent cells", reapplied);
    SyncEvent::SnapshotApplied { width, height, reapplied }
}

/// Commands sent to the worker thread.
enum SyncCommand {
    Poll,
    Submit(EditPayload),
    Close,
}

/// Drives polling and edit submission against a [`RemoteService`].
pub struct SyncManager {
    status: SyncStatus,
    timer: PollTimer,
    /// Channel to send commands to the worker thread.
    cmd_tx: Option<Sender<SyncCommand>>,
    /// Channel to receive results from the worker thread.
    event_rx: Option<Receiver<SyncEvent>>,
    /// Handle to the worker thread.
    _thread: Option<JoinHandle<()>>,
}

impl SyncManager {
    /// Start a worker thread talking to `remote`.
    pub fn start(remote: Arc<dyn RemoteService>, poll_interval: Duration) -> SyncResult<Self> {
        let (cmd_tx, cmd_rx) = channel::<SyncCommand>();
        let (event_tx, event_rx) = channel::<SyncEvent>();

        let handle = thread::Builder::new()
            .name("pixelgarden-sync".to_string())
            .spawn(move || run_worker(remote.as_ref(), cmd_rx, event_tx))
            .map_err(|e| SyncError::Worker(e.to_string()))?;

        Ok(Self {
            status: SyncStatus::default(),
            timer: PollTimer::new(poll_interval),
            cmd_tx: Some(cmd_tx),
            event_rx: Some(event_rx),
            _thread: Some(handle),
        })
    }

    /// Start a worker talking HTTP to the configured server.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn connect(config: &crate::config::SyncConfig) -> SyncResult<Self> {
        let url = config
            .parsed_url()
            .map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
        let remote = HttpRemote::new(url)?;
        Self::start(Arc::new(remote), config.poll_interval())
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    fn send(&self, cmd: SyncCommand) -> SyncResult<()> {
        let tx = self
            .cmd_tx
            .as_ref()
            .ok_or_else(|| SyncError::Worker("stopped".to_string()))?;
        tx.send(cmd)
            .map_err(|e| SyncError::Worker(format!("send failed: {}", e)))
    }

    /// Ask the worker to fetch a full snapshot.
    pub fn poll_snapshot(&mut self) -> SyncResult<()> {
        self.send(SyncCommand::Poll)?;
        self.status.pending_polls += 1;
        Ok(())
    }

    /// Hand a finished stroke to the worker. Fire-and-forget: the outcome
    /// arrives later as an event and failed strokes are not retried.
    pub fn submit_edit(&mut self, payload: EditPayload) -> SyncResult<()> {
        self.send(SyncCommand::Submit(payload))?;
        self.status.pending_submits += 1;
        Ok(())
    }

    /// Start a poll if the timer says one is due. Returns true if started.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.timer.should_poll(now) {
            return false;
        }
        self.timer.mark(now);
        match self.poll_snapshot() {
            Ok(()) => true,
            Err(e) => {
                log::error!("Not able to start poll: {}", e);
                false
            }
        }
    }

    fn track(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::SnapshotReceived(_) | SyncEvent::PollFailed { .. } => {
                self.status.pending_polls = self.status.pending_polls.saturating_sub(1);
            }
            SyncEvent::EditDelivered { .. } | SyncEvent::EditFailed { .. } => {
                self.status.pending_submits = self.status.pending_submits.saturating_sub(1);
            }
            SyncEvent::SnapshotApplied { .. } => {}
        }
    }

    /// Drain finished requests without blocking.
    pub fn poll_events(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        if let Some(ref rx) = self.event_rx {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        for event in &events {
            self.track(event);
        }
        events
    }

    /// Block until the next result arrives or `timeout` passes.
    pub fn wait_event(&mut self, timeout: Duration) -> Option<SyncEvent> {
        let event = match self.event_rx.as_ref()?.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
        };
        self.track(&event);
        Some(event)
    }

    /// Drain finished requests and apply any snapshots to `engine`.
    ///
    /// Received snapshots are reported as [`SyncEvent::SnapshotApplied`];
    /// other events are passed through.
    pub fn pump(&mut self, engine: &mut CanvasEngine, surface: &mut dyn RenderSurface) -> Vec<SyncEvent> {
        self.poll_events()
            .into_iter()
            .map(|event| match event {
                SyncEvent::SnapshotReceived(snapshot) => apply_snapshot(engine, surface, snapshot),
                other => other,
            })
            .collect()
    }

    /// Stop the worker thread. Outstanding requests are abandoned.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(SyncCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.status = SyncStatus::default();
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(remote: &dyn RemoteService, cmd_rx: Receiver<SyncCommand>, event_tx: Sender<SyncEvent>) {
    log::info!("Sync worker started");
    while let Ok(cmd) = cmd_rx.recv() {
        let event = match cmd {
            SyncCommand::Poll => match remote.poll_full_image() {
                Ok(store) => {
                    log::info!("Polled full image from server ({}x{})", store.width(), store.height());
                    SyncEvent::SnapshotReceived(store)
                }
                Err(e) => {
                    log::error!("Not able to poll full image: {}", e);
                    SyncEvent::PollFailed { message: e.to_string() }
                }
            },
            SyncCommand::Submit(payload) => {
                let cells = payload.cells.len();
                match remote.queue_event(&payload) {
                    Ok(()) => {
                        log::debug!("Queued edit of {} cells", cells);
                        SyncEvent::EditDelivered { cells }
                    }
                    Err(e) => {
                        log::error!("Error queueing edit of {} cells: {}", cells, e);
                        SyncEvent::EditFailed { cells, message: e.to_string() }
                    }
                }
            }
            SyncCommand::Close => {
                log::info!("Sync worker close requested");
                break;
            }
        };
        if event_tx.send(event).is_err() {
            log::info!("Sync event channel disconnected");
            break;
        }
    }
    log::info!("Sync worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::surface::PixelBuffer;
    use crate::tools::ToolKind;
    use crate::viewport::GridPos;
    use kurbo::{Point, Size};

    const WAIT: Duration = Duration::from_secs(5);

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn engine_and_surface() -> (CanvasEngine, PixelBuffer) {
        let mut engine = CanvasEngine::new();
        let mut surface = PixelBuffer::new(100, 100);
        engine.resize(&mut surface, Size::new(100.0, 100.0));
        (engine, surface)
    }

    #[test]
    fn test_reconcile_protects_open_stroke() {
        let (mut engine, mut surface) = engine_and_surface();
        let old = Color::from_rgb(0x11, 0x22, 0x33);
        engine.tools.selected_color = Color::WHITE;
        engine.begin_stroke(ToolKind::Draw);
        engine.paint_stroke(&mut surface, Point::new(55.0, 55.0), 1);

        let mut snapshot = PixelStore::new(1000, 1000, Color::BLACK);
        snapshot.set(GridPos::new(5, 5), old);

        let event = apply_snapshot(&mut engine, &mut surface, snapshot);
        assert!(matches!(event, SyncEvent::SnapshotApplied { reapplied: 1, .. }));
        assert_eq!(engine.pixels().get(GridPos::new(5, 5)), Some(Color::WHITE));
        assert_eq!(surface.pixel(55, 55), Some(Color::WHITE));
    }

    #[test]
    fn test_snapshot_without_stroke_replaces_everything() {
        let (mut engine, mut surface) = engine_and_surface();
        engine.tools.selected_color = Color::WHITE;
        engine.paint_stroke(&mut surface, Point::new(5.0, 5.0), 1);

        let snapshot = PixelStore::new(10, 20, Color::BLACK);
        apply_snapshot(&mut engine, &mut surface, snapshot);
        assert_eq!(engine.pixels().size(), (10, 20));
        assert_eq!(engine.pixels().get(GridPos::new(0, 0)), Some(Color::BLACK));
    }

    #[test]
    fn test_reconcile_skips_cells_outside_smaller_snapshot() {
        let mut stroke = EditEvent::begin(Color::WHITE);
        stroke.record(GridPos::new(1, 1));
        stroke.record(GridPos::new(50, 50));
        let mut store = PixelStore::new(10, 10, Color::BLACK);
        assert_eq!(reconcile(&mut store, Some(&stroke)), 1);
        assert_eq!(store.get(GridPos::new(1, 1)), Some(Color::WHITE));
    }

    #[test]
    fn test_poll_timer() {
        let start = Instant::now();
        let mut timer = PollTimer::new(Duration::from_secs(5));
        assert!(timer.should_poll(start));
        timer.mark(start);
        assert!(!timer.should_poll(start + Duration::from_secs(4)));
        assert!(timer.should_poll(start + Duration::from_secs(5)));
    }

    #[test]
    fn test_poll_delivers_snapshot() {
        init_logging();
        let remote = Arc::new(MemoryRemote::new(4, 3, Color::BLACK));
        remote.set_pixel(GridPos::new(3, 2), Color::WHITE);
        let mut sync = SyncManager::start(remote, Duration::from_secs(5)).unwrap();
        let (mut engine, mut surface) = engine_and_surface();

        sync.poll_snapshot().unwrap();
        assert!(sync.status().is_polling());
        let event = sync.wait_event(WAIT).unwrap();
        assert!(sync.status().is_idle());
        let SyncEvent::SnapshotReceived(snapshot) = event else {
            panic!("expected a snapshot, got {:?}", event);
        };
        apply_snapshot(&mut engine, &mut surface, snapshot);
        assert_eq!(engine.pixels().size(), (4, 3));
        assert_eq!(engine.pixels().get(GridPos::new(3, 2)), Some(Color::WHITE));
    }

    /// Pump until it reports something or `WAIT` passes.
    fn pump_until_event(
        sync: &mut SyncManager,
        engine: &mut CanvasEngine,
        surface: &mut PixelBuffer,
    ) -> Vec<SyncEvent> {
        let deadline = Instant::now() + WAIT;
        loop {
            let events = sync.pump(engine, surface);
            if !events.is_empty() || Instant::now() >= deadline {
                return events;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_pump_reconciles_open_stroke() {
        init_logging();
        let old = Color::from_rgb(0x11, 0x22, 0x33);
        let remote = Arc::new(MemoryRemote::new(20, 20, Color::BLACK));
        remote.set_pixel(GridPos::new(5, 5), old);
        remote.set_pixel(GridPos::new(7, 7), old);
        let mut sync = SyncManager::start(remote, Duration::from_secs(5)).unwrap();
        let (mut engine, mut surface) = engine_and_surface();

        engine.tools.selected_color = Color::WHITE;
        assert!(engine.begin_stroke(ToolKind::Draw));
        assert_eq!(engine.paint_stroke(&mut surface, Point::new(55.0, 55.0), 1), 1);

        sync.poll_snapshot().unwrap();
        let events = pump_until_event(&mut sync, &mut engine, &mut surface);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            SyncEvent::SnapshotApplied { width: 20, height: 20, reapplied: 1 }
        ));
        assert!(sync.status().is_idle());

        // The unsent cell survives, everything else comes from the server
        assert_eq!(engine.pixels().size(), (20, 20));
        assert_eq!(engine.pixels().get(GridPos::new(5, 5)), Some(Color::WHITE));
        assert_eq!(engine.pixels().get(GridPos::new(7, 7)), Some(old));
        assert_eq!(surface.pixel(55, 55), Some(Color::WHITE));
        assert_eq!(surface.pixel(75, 75), Some(old));

        // The stroke is still open and still submits its cell
        let payload = engine.finish_stroke().unwrap();
        assert_eq!(payload.cells, vec![GridPos::new(5, 5)]);
    }

    #[test]
    fn test_submit_reaches_remote() {
        init_logging();
        let remote = Arc::new(MemoryRemote::new(10, 10, Color::BLACK));
        let mut sync = SyncManager::start(remote.clone(), Duration::from_secs(5)).unwrap();

        let mut stroke = EditEvent::begin(Color::WHITE);
        stroke.record(GridPos::new(2, 2));
        sync.submit_edit(stroke.finish()).unwrap();
        assert!(sync.status().is_queuing());

        let event = sync.wait_event(WAIT).unwrap();
        assert!(matches!(event, SyncEvent::EditDelivered { cells: 1 }));
        assert_eq!(remote.pixel(GridPos::new(2, 2)), Some(Color::WHITE));
        assert_eq!(remote.received().len(), 1);
    }

    #[test]
    fn test_poll_failure_leaves_store_untouched() {
        init_logging();
        let remote = Arc::new(MemoryRemote::new(10, 10, Color::WHITE));
        remote.fail_polls(true);
        let mut sync = SyncManager::start(remote, Duration::from_secs(5)).unwrap();
        let (mut engine, mut surface) = engine_and_surface();
        let before = engine.pixels().clone();

        sync.poll_snapshot().unwrap();
        let event = sync.wait_event(WAIT).unwrap();
        assert!(matches!(event, SyncEvent::PollFailed { .. }));
        // Nothing left to apply
        assert!(sync.pump(&mut engine, &mut surface).is_empty());
        assert_eq!(engine.pixels(), &before);
    }

    #[test]
    fn test_malformed_snapshot_is_poll_failure() {
        init_logging();
        let remote = Arc::new(MemoryRemote::new(2, 2, Color::BLACK));
        remote.respond_with(Some(r##"{ "size_x": 2, "size_y": 2, "image": [] }"##.to_string()));
        let mut sync = SyncManager::start(remote, Duration::from_secs(5)).unwrap();

        sync.poll_snapshot().unwrap();
        match sync.wait_event(WAIT).unwrap() {
            SyncEvent::PollFailed { message } => assert!(message.contains("rows")),
            other => panic!("expected poll failure, got {:?}", other),
        }
    }

    #[test]
    fn test_submit_failure_is_reported_not_retried() {
        init_logging();
        let remote = Arc::new(MemoryRemote::new(10, 10, Color::BLACK));
        remote.fail_submits(true);
        let mut sync = SyncManager::start(remote.clone(), Duration::from_secs(5)).unwrap();

        let mut stroke = EditEvent::begin(Color::WHITE);
        stroke.record(GridPos::new(1, 1));
        sync.submit_edit(stroke.finish()).unwrap();
        assert!(matches!(sync.wait_event(WAIT), Some(SyncEvent::EditFailed { cells: 1, .. })));
        assert!(sync.wait_event(Duration::from_millis(100)).is_none());
        assert!(remote.received().is_empty());
    }

    #[test]
    fn test_tick_respects_interval() {
        let remote = Arc::new(MemoryRemote::new(2, 2, Color::BLACK));
        let mut sync = SyncManager::start(remote, Duration::from_secs(5)).unwrap();
        let now = Instant::now();
        assert!(sync.tick(now));
        assert!(!sync.tick(now + Duration::from_secs(1)));
        assert!(sync.tick(now + Duration::from_secs(6)));
        assert_eq!(sync.status().pending_polls, 2);
    }

    #[test]
    fn test_shutdown_rejects_requests() {
        let remote = Arc::new(MemoryRemote::new(2, 2, Color::BLACK));
        let mut sync = SyncManager::start(remote, Duration::from_secs(5)).unwrap();
        sync.shutdown();
        assert!(matches!(sync.poll_snapshot(), Err(SyncError::Worker(_))));
    }
}
