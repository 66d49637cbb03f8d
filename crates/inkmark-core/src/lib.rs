//! Inkmark Core Library
//!
//! Platform-agnostic engine for freehand page annotation: gesture
//! recognition, stroke storage with spatial erase, polyline simplification,
//! two-layer rendering and persistence.

pub mod annotator;
pub mod config;
pub mod geometry;
pub mod gesture;
pub mod host;
pub mod input;
pub mod persistence;
pub mod render;
pub mod spatial;
pub mod storage;
pub mod store;
pub mod stroke;
pub mod viewport;

pub use annotator::{Annotator, CLEAR_CONFIRMATION, Confirm};
pub use config::{AnnotatorConfig, ConfigError, ToolSettings};
pub use gesture::{GestureContext, GestureIntent, GestureMachine, GestureState};
pub use host::{DrawOp, ManualFrames, RecordingSurface, SimulatedHost};
pub use input::{MouseButton, PointerEvent, PointerId, PointerKind, PointerPhase};
pub use persistence::{PersistError, page_storage_key};
pub use render::{Blend, FrameRequest, FrameScheduler, RenderError, RenderPipeline, StrokePaint, Surface};
pub use spatial::QuadTree;
pub use storage::{KeyValueStorage, MemoryStorage, StorageError, StorageResult};
pub use store::{CommitOutcome, StrokeStore};
pub use stroke::{Rgb, Stroke, StrokeId, Tool, ToolStyle};
pub use viewport::{ScrollHost, ViewportChange, ViewportMetrics, ViewportTracker};

#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStorage;
