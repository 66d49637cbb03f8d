//! Inkmark Render Library
//!
//! Rendering backends for the annotation layers. The engine in
//! `inkmark-core` paints through its `Surface` trait; this crate provides a
//! surface that records into a vello scene.

#[cfg(feature = "vello-renderer")]
mod scene;

pub use inkmark_core::render::{Blend, RenderError, StrokePaint, Surface};

#[cfg(feature = "vello-renderer")]
pub use scene::SceneSurface;

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;
