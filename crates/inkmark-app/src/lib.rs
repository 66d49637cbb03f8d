//! Inkmark Application
//!
//! Application shells for the annotation engine: headless session replay
//! on native platforms and the browser overlay on WebAssembly.

pub mod session;

pub use session::{PointerRecord, Replay, ReplayReport, SceneAnnotator, Session, SessionError, SessionEvent};

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::{InkmarkOverlay, run_wasm};
