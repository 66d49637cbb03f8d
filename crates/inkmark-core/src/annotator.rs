//! The annotator: single owner of strokes, gestures, viewport and layers.
//!
//! Hosts feed it pointer events, viewport ticks and animation frames; every
//! mutation of the stroke collection happens synchronously inside one of
//! those calls.

use crate::config::{AnnotatorConfig, ToolSettings};
use crate::gesture::{GestureContext, GestureIntent, GestureMachine, GestureState};
use crate::input::PointerEvent;
use crate::persistence::page_storage_key;
use crate::render::{FrameScheduler, RenderPipeline, Surface};
use crate::storage::KeyValueStorage;
use crate::store::{CommitOutcome, StrokeStore};
use crate::stroke::{Rgb, Stroke, StrokeId, Tool};
use crate::viewport::{ScrollHost, ViewportChange, ViewportMetrics, ViewportTracker};
use kurbo::Point;

/// Prompt shown before clearing every annotation on the page.
pub const CLEAR_CONFIRMATION: &str =
    "Clear all notes and highlights on this page? This cannot be undone.";

/// Yes/no prompt for destructive actions.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

/// Annotation overlay engine for one page.
#[derive(Debug)]
pub struct Annotator<S, H, F, K> {
    config: AnnotatorConfig,
    tools: ToolSettings,
    tool: Tool,
    active: bool,
    store: StrokeStore,
    gesture: GestureMachine,
    viewport: ViewportTracker,
    pipeline: RenderPipeline<S>,
    host: H,
    frames: F,
    storage: K,
    storage_key: String,
}

impl<S, H, F, K> Annotator<S, H, F, K>
where
    S: Surface,
    H: ScrollHost,
    F: FrameScheduler,
    K: KeyValueStorage,
{
    /// Create an annotator for the page at `page_path`, loading its stored
    /// strokes and sizing both layers. Annotation mode starts inactive.
    pub fn new(
        config: AnnotatorConfig,
        page_path: &str,
        pipeline: RenderPipeline<S>,
        host: H,
        frames: F,
        storage: K,
    ) -> Self {
        let storage_key = page_storage_key(&config.storage_key_prefix, page_path);
        let store = StrokeStore::with_params(
            kurbo::Rect::ZERO,
            config.simplify_tolerance,
            config.quadtree_max_objects,
            config.quadtree_max_depth,
        );
        let gesture =
            GestureMachine::new(config.pan_move_threshold, config.two_finger_tap_timeout());

        let mut annotator = Self {
            tools: config.tools.clone(),
            config,
            tool: Tool::Pen,
            active: false,
            store,
            gesture,
            viewport: ViewportTracker::new(),
            pipeline,
            host,
            frames,
            storage,
            storage_key,
        };

        annotator
            .store
            .load(&annotator.storage, &annotator.storage_key, &annotator.tools);
        annotator.on_viewport_tick();
        log::info!(
            "Annotator ready for {} with {} strokes",
            annotator.storage_key,
            annotator.store.len()
        );
        annotator
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn store(&self) -> &StrokeStore {
        &self.store
    }

    /// Committed strokes in paint order.
    pub fn strokes(&self) -> &[Stroke] {
        self.store.strokes()
    }

    pub fn pipeline(&self) -> &RenderPipeline<S> {
        &self.pipeline
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access; call [`Self::on_viewport_tick`] after changing it.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn frames(&self) -> &F {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut F {
        &mut self.frames
    }

    pub fn storage(&self) -> &K {
        &self.storage
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn metrics(&self) -> ViewportMetrics {
        self.viewport.metrics()
    }

    pub fn gesture_state(&self) -> GestureState {
        self.gesture.state()
    }

    pub fn live_stroke(&self) -> Option<&Stroke> {
        self.gesture.live_stroke()
    }

    // --- Mode and tools ---

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Turn annotation mode on or off. Turning it off drops any gesture in
    /// progress along with its stroke.
    pub fn set_mode_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        log::info!("Annotation mode {}", if active { "on" } else { "off" });

        if !active {
            self.reset_gesture();
        }
    }

    /// Flip annotation mode; returns the new state.
    pub fn toggle_mode(&mut self) -> bool {
        self.set_mode_active(!self.active);
        self.active
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Tool used for the next stroke. A stroke in progress keeps its own.
    pub fn select_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn tools(&self) -> &ToolSettings {
        &self.tools
    }

    /// Set a tool's color; returns `false` for the eraser.
    pub fn set_color(&mut self, tool: Tool, color: Rgb) -> bool {
        self.tools.set_color(tool, color)
    }

    /// Set a tool's width, clamped to its range; returns the stored width.
    pub fn set_line_width(&mut self, tool: Tool, width: f64) -> f64 {
        self.tools.set_line_width(tool, width)
    }

    /// Apply a width slider drag; returns the stored width.
    pub fn drag_line_width(&mut self, tool: Tool, start_width: f64, delta_x: f64) -> f64 {
        self.tools.drag_line_width(tool, start_width, delta_x)
    }

    // --- Input ---

    /// Feed one pointer event. Ignored while annotation mode is off.
    pub fn handle_pointer(&mut self, event: &PointerEvent) {
        if !self.active {
            return;
        }

        let ctx = GestureContext {
            scroll_offset: self.host.scroll_offset(),
            style: self.tools.style_for(self.tool),
        };
        for intent in self.gesture.handle(event, &ctx) {
            self.apply(intent);
        }
    }

    /// Feed a coalesced batch in arrival order.
    pub fn handle_pointer_batch(&mut self, events: &[PointerEvent]) {
        for event in events {
            self.handle_pointer(event);
        }
    }

    fn apply(&mut self, intent: GestureIntent) {
        match intent {
            GestureIntent::RequestRender => self.request_frame(),
            GestureIntent::CancelRender => self.pipeline.cancel_frame(&mut self.frames),
            GestureIntent::Commit(stroke) => self.commit(stroke),
            GestureIntent::Undo => {
                self.undo();
            }
            GestureIntent::ScrollBy(delta) => {
                self.host.scroll_by(delta);
                self.on_viewport_tick();
            }
        }
    }

    fn commit(&mut self, stroke: Stroke) {
        let outcome = self.store.commit(stroke);
        match &outcome {
            CommitOutcome::Added(id) => log::debug!("Committed stroke {}", id),
            CommitOutcome::Erased(ids) => log::debug!("Eraser removed {} strokes", ids.len()),
            CommitOutcome::Discarded => {}
        }
        if outcome.changed() {
            self.strokes_changed();
        } else {
            self.request_frame();
        }
    }

    // --- Stroke operations ---

    /// Remove the most recently committed stroke.
    pub fn undo(&mut self) -> Option<StrokeId> {
        let stroke = self.store.undo()?;
        log::debug!("Undid stroke {}", stroke.id());
        self.strokes_changed();
        Some(stroke.id())
    }

    /// Remove every stroke after asking `confirm`. Returns whether it cleared.
    pub fn clear_all<C: Confirm + ?Sized>(&mut self, confirm: &mut C) -> bool {
        if !confirm.confirm(CLEAR_CONFIRMATION) {
            return false;
        }

        self.store.clear();
        if let Err(e) = self.storage.remove(&self.storage_key) {
            log::warn!("Failed to clear stored annotations: {}", e);
        }
        self.pipeline.redraw_committed(self.store.strokes());
        self.request_frame();
        log::info!("Cleared all annotations for {}", self.storage_key);
        true
    }

    /// Smoothly scroll so the stroke is centered in the viewport.
    pub fn scroll_to_stroke(&mut self, id: StrokeId) -> bool {
        let Some(stroke) = self.store.get(id) else {
            return false;
        };
        let center = stroke.bounds().center();
        let viewport = self.viewport.metrics().viewport;
        let target = Point::new(
            (center.x - viewport.width / 2.0).max(0.0),
            (center.y - viewport.height / 2.0).max(0.0),
        );
        self.host.scroll_to(target, true);
        self.on_viewport_tick();
        true
    }

    // --- Host callbacks ---

    /// Re-measure the host after a scroll or resize.
    pub fn on_viewport_tick(&mut self) -> ViewportChange {
        let change = self.viewport.tick(&self.host);
        let metrics = self.viewport.metrics();

        match change {
            ViewportChange::DocumentResized => {
                self.pipeline.resize_viewport(metrics.viewport);
                self.pipeline
                    .resize_document(metrics.document, self.store.strokes());
                self.store.set_bounds(metrics.document_rect());
            }
            ViewportChange::Moved => self.pipeline.resize_viewport(metrics.viewport),
            ViewportChange::Unchanged => {}
        }

        self.request_frame();
        change
    }

    /// Deliver the scheduled animation frame. Returns whether the live
    /// layer was painted.
    pub fn on_animation_frame(&mut self) -> bool {
        let metrics = self.viewport.metrics();
        self.pipeline.on_frame(&metrics, self.gesture.live_stroke())
    }

    /// Stop all pending work and drop the gesture in progress.
    pub fn shutdown(&mut self) {
        self.reset_gesture();
        self.active = false;
        log::info!("Annotator for {} shut down", self.storage_key);
    }

    fn reset_gesture(&mut self) {
        if self.gesture.reset().is_some() {
            log::debug!("Dropped live stroke");
        }
        self.pipeline.cancel_frame(&mut self.frames);
        let metrics = self.viewport.metrics();
        self.pipeline.compose(&metrics, None);
    }

    fn request_frame(&mut self) {
        self.pipeline.request_frame(&mut self.frames);
    }

    fn strokes_changed(&mut self) {
        self.pipeline.redraw_committed(self.store.strokes());
        self.persist();
        self.request_frame();
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.storage, &self.storage_key) {
            log::warn!("Failed to save annotations: {}", e);
        }
    }
}
