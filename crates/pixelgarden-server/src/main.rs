//! PixelGarden Canvas Server
//!
//! Holds the authoritative pixel grid, serves it to clients and keeps it on
//! disk across restarts.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /poll_full_image  -> { "size_x": 1000, "size_y": 1000, "image": [["#000000", ...], ...] }
//! POST /queue_event      <- { "color": "#ffffff", "pixel_list": [{ "x": 2, "y": 3 }] }
//! GET  /health           -> ok
//! ```
//!
//! Submitted edits are queued and applied in arrival order by a single
//! worker task. Pixels outside the grid are skipped. A save task writes the
//! grid to the data directory whenever it changed, and a backup task copies
//! the saved file into `backups/` on a longer interval.

mod storage;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use pixelgarden_core::sync::wire::{FullImage, POLL_FULL_IMAGE_PATH, QUEUE_EVENT_PATH};
use pixelgarden_core::{Color, EditPayload, GridPos, PixelStore};
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::PathBuf,
    str::FromStr,
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use storage::{FileStore, StorageError, StorageResult};
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

/// Pending edits the worker may lag behind by before submitters wait.
const EVENT_QUEUE_CAPACITY: usize = 1024;

const DEFAULT_ADDR: &str = "0.0.0.0:3030";
const DEFAULT_SIZE: u32 = 1000;
const DEFAULT_DATA_DIR: &str = "images";
const DEFAULT_SAVE_INTERVAL_SECS: u64 = 2;
const DEFAULT_BACKUP_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Invalid server settings.
#[derive(Debug, Error)]
enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Server settings read from `PIXELGARDEN_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
struct ServerConfig {
    addr: SocketAddr,
    width: u32,
    height: u32,
    background: Color,
    /// Directory holding the saved grid and its backups.
    data_dir: PathBuf,
    save_interval: Duration,
    backup_interval: Duration,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr = parse_var(&lookup, "PIXELGARDEN_ADDR", DEFAULT_ADDR)?;
        let width: u32 = parse_var(&lookup, "PIXELGARDEN_WIDTH", &DEFAULT_SIZE.to_string())?;
        let height: u32 = parse_var(&lookup, "PIXELGARDEN_HEIGHT", &DEFAULT_SIZE.to_string())?;
        let background = parse_var(&lookup, "PIXELGARDEN_BACKGROUND", "#000000")?;
        let data_dir = parse_var(&lookup, "PIXELGARDEN_DATA_DIR", DEFAULT_DATA_DIR)?;
        let save_interval = parse_secs(
            &lookup,
            "PIXELGARDEN_SAVE_INTERVAL_SECS",
            DEFAULT_SAVE_INTERVAL_SECS,
        )?;
        let backup_interval = parse_secs(
            &lookup,
            "PIXELGARDEN_BACKUP_INTERVAL_SECS",
            DEFAULT_BACKUP_INTERVAL_SECS,
        )?;
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid {
                name: "grid size",
                value: format!("{}x{}", width, height),
            });
        }
        Ok(Self {
            addr,
            width,
            height,
            background,
            data_dir,
            save_interval,
            backup_interval,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
) -> Result<T, ConfigError> {
    let value = lookup(name).unwrap_or_else(|| default.to_string());
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

/// A positive number of seconds.
fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_var(lookup, name, &default.to_string())?;
    if secs == 0 {
        return Err(ConfigError::Invalid { name, value: "0".to_string() });
    }
    Ok(Duration::from_secs(secs))
}

/// Body of `POST /queue_event`.
///
/// The color stays a string until the handler has validated it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueEventRequest {
    color: String,
    pixel_list: Vec<GridPos>,
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
struct ErrorBody {
    error: String,
}

/// A request rejected by a handler.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

/// The authoritative grid plus a flag telling the save task it changed.
struct Grid {
    image: RwLock<PixelStore>,
    dirty: AtomicBool,
}

impl Grid {
    fn new(image: PixelStore) -> Self {
        Self {
            image: RwLock::new(image),
            dirty: AtomicBool::new(false),
        }
    }

    /// Write one edit. Returns the number of cells written.
    async fn apply(&self, payload: &EditPayload) -> usize {
        let written = apply_event(&mut *self.image.write().await, payload);
        if written > 0 {
            self.dirty.store(true, Ordering::SeqCst);
        }
        written
    }

    async fn full_image(&self) -> FullImage {
        FullImage::from_store(&*self.image.read().await)
    }

    /// Clear the changed flag, returning whether it was set.
    fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }
}

/// Shared application state
struct AppState {
    grid: Arc<Grid>,
    /// Edits waiting for the worker
    events: mpsc::Sender<EditPayload>,
}

impl AppState {
    /// Wrap the starting grid and start its event worker.
    fn new(image: PixelStore) -> (Arc<Self>, JoinHandle<()>) {
        let grid = Arc::new(Grid::new(image));
        let (events, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let worker = spawn_event_worker(grid.clone(), rx);
        (Arc::new(Self { grid, events }), worker)
    }
}

/// Write one edit into the grid. Returns the number of cells written.
fn apply_event(image: &mut PixelStore, payload: &EditPayload) -> usize {
    payload
        .cells
        .iter()
        .filter(|&&cell| image.set(cell, payload.color))
        .count()
}

/// Apply queued edits in arrival order until every sender is gone.
fn spawn_event_worker(grid: Arc<Grid>, mut rx: mpsc::Receiver<EditPayload>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting up event worker");
        while let Some(payload) = rx.recv().await {
            let written = grid.apply(&payload).await;
            let skipped = payload.cells.len() - written;
            if skipped > 0 {
                debug!("Skipped {} out-of-bounds pixels", skipped);
            }
            debug!("Applied {} pixels of {}", written, payload.color);
        }
        info!("Event worker stopped");
    })
}

/// The saved grid if there is one, otherwise a fresh background-filled grid.
fn initial_image(config: &ServerConfig, store: &FileStore) -> StorageResult<PixelStore> {
    match store.load()? {
        Some(image) => {
            info!(
                "Loaded previously stored {}x{} grid from {}",
                image.width(),
                image.height(),
                store.image_path().display()
            );
            Ok(image)
        }
        None => {
            info!("Generated new empty {}x{} grid", config.width, config.height);
            Ok(PixelStore::new(config.width, config.height, config.background))
        }
    }
}

/// Save the grid if it changed since the last save. Returns true if saved.
///
/// A failed save leaves the grid marked as changed so the next tick retries.
async fn save_if_dirty(grid: &Grid, store: &Arc<FileStore>) -> StorageResult<bool> {
    if !grid.take_dirty() {
        return Ok(false);
    }
    let image = grid.full_image().await;
    let store = store.clone();
    let result = tokio::task::spawn_blocking(move || store.save(&image))
        .await
        .map_err(|e| StorageError::Io(format!("Save task failed: {}", e)))
        .and_then(|saved| saved);
    if result.is_err() {
        grid.mark_dirty();
    }
    result.map(|()| true)
}

fn spawn_save_task(grid: Arc<Grid>, store: Arc<FileStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting up save task ({}s interval)", every.as_secs());
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match save_if_dirty(&grid, &store).await {
                Ok(true) => debug!("Saved grid to disk"),
                Ok(false) => {}
                Err(e) => error!("Failed to save grid: {}", e),
            }
        }
    })
}

fn spawn_backup_task(store: Arc<FileStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting up backup task ({}s interval)", every.as_secs());
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let store = store.clone();
            match tokio::task::spawn_blocking(move || store.backup()).await {
                Ok(Ok(Some(path))) => info!("Backed up grid to {}", path.display()),
                Ok(Ok(None)) => debug!("No saved grid to back up yet"),
                Ok(Err(e)) => warn!("Cannot create backup: {}", e),
                Err(e) => warn!("Backup task failed: {}", e),
            }
        }
    })
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&format!("/{}", POLL_FULL_IMAGE_PATH), get(poll_full_image))
        .route(&format!("/{}", QUEUE_EVENT_PATH), post(queue_event))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixelgarden_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let store = Arc::new(FileStore::new(config.data_dir.clone())?);
    info!("Persisting grid in {}", store.base_path().display());
    let image = initial_image(&config, &store)?;
    let (width, height) = image.size();

    let (state, _worker) = AppState::new(image);
    let grid = state.grid.clone();
    let _saver = spawn_save_task(grid.clone(), store.clone(), config.save_interval);
    let _backups = spawn_backup_task(store.clone(), config.backup_interval);
    let app = router(state);

    info!("PixelGarden server listening on {} ({}x{} grid)", config.addr, width, height);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if save_if_dirty(&grid, &store).await? {
        info!("Saved grid before exit");
    }
    Ok(())
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// Full grid snapshot
async fn poll_full_image(State(state): State<Arc<AppState>>) -> Json<FullImage> {
    Json(state.grid.full_image().await)
}

/// Validate an edit and hand it to the event worker
async fn queue_event(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueueEventRequest>,
) -> Result<StatusCode, ApiError> {
    let color = Color::from_str(&request.color).map_err(|e| {
        warn!("Rejected edit with color {:?}: {}", request.color, e);
        ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid color {:?}: {}", request.color, e))
    })?;
    let payload = EditPayload { color, cells: request.pixel_list };
    state.events.send(payload).await.map_err(|_| {
        warn!("Event worker is gone, dropping edit");
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Event worker is not running")
    })?;
    Ok(StatusCode::ACCEPTED)
}
