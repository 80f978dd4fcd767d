//! PixelGarden Core Library
//!
//! Client-side logic for a shared pixel canvas: camera and coordinate
//! transforms, the local pixel store, stroke batching, gesture tracking and
//! synchronization with the canvas server.

pub mod canvas;
pub mod color;
pub mod config;
pub mod event;
pub mod export;
pub mod gesture;
pub mod input;
pub mod pixels;
pub mod surface;
pub mod sync;
pub mod tools;
pub mod viewport;

pub use canvas::CanvasEngine;
pub use color::{Color, ColorParseError};
pub use config::{ClientConfig, ConfigError, EngineConfig, SyncConfig};
pub use event::{EditEvent, EditPayload};
pub use export::{ExportError, encode_png, png_data_url};
pub use gesture::GestureInterpreter;
pub use input::{Buttons, InputDispatcher, InputEvent};
pub use pixels::PixelStore;
pub use surface::{PixelBuffer, RenderSurface};
pub use sync::{MemoryRemote, RemoteService, SyncError, SyncEvent, SyncManager, apply_snapshot, reconcile};
pub use tools::{BrushSize, ToolKind, ToolManager};
pub use viewport::{GridPos, Viewport};
