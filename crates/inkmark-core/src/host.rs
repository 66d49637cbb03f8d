//! In-memory host collaborators for headless use: a scrollable page, a
//! frame scheduler driven by hand and a surface that records draw calls.

use crate::render::{FrameScheduler, StrokePaint, Surface};
use crate::viewport::ScrollHost;
use kurbo::{Point, Rect, Size, Vec2};

/// A page with a fixed viewport and a scrollable document.
///
/// Scrolling clamps to the document like a browser window does.
#[derive(Debug, Clone)]
pub struct SimulatedHost {
    viewport: Size,
    document: Size,
    extra_content: Vec<Size>,
    scroll: Vec2,
    scroll_requests: Vec<Vec2>,
    last_scroll_to: Option<(Point, bool)>,
}

impl SimulatedHost {
    pub fn new(viewport: Size, document: Size) -> Self {
        Self {
            viewport,
            document,
            extra_content: Vec::new(),
            scroll: Vec2::ZERO,
            scroll_requests: Vec::new(),
            last_scroll_to: None,
        }
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        self.viewport = size;
        self.scroll = self.clamp(self.scroll);
    }

    pub fn set_document_size(&mut self, size: Size) {
        self.document = size;
        self.scroll = self.clamp(self.scroll);
    }

    /// Report an additional content measurement, e.g. a late-loading element.
    pub fn push_content_size(&mut self, size: Size) {
        self.extra_content.push(size);
    }

    /// Every `scroll_by` delta received, before clamping.
    pub fn scroll_requests(&self) -> &[Vec2] {
        &self.scroll_requests
    }

    /// Sum of all requested scroll deltas.
    pub fn requested_scroll(&self) -> Vec2 {
        self.scroll_requests.iter().fold(Vec2::ZERO, |acc, d| acc + *d)
    }

    /// Target and smoothness of the last `scroll_to`.
    pub fn last_scroll_to(&self) -> Option<(Point, bool)> {
        self.last_scroll_to
    }

    fn clamp(&self, scroll: Vec2) -> Vec2 {
        let max_x = (self.document.width - self.viewport.width).max(0.0);
        let max_y = (self.document.height - self.viewport.height).max(0.0);
        Vec2::new(scroll.x.clamp(0.0, max_x), scroll.y.clamp(0.0, max_y))
    }
}

impl ScrollHost for SimulatedHost {
    fn viewport_size(&self) -> Size {
        self.viewport
    }

    fn scroll_offset(&self) -> Vec2 {
        self.scroll
    }

    fn content_sizes(&self) -> Vec<Size> {
        let mut sizes = vec![self.document];
        sizes.extend(&self.extra_content);
        sizes
    }

    fn scroll_by(&mut self, delta: Vec2) {
        self.scroll_requests.push(delta);
        self.scroll = self.clamp(self.scroll + delta);
    }

    fn scroll_to(&mut self, position: Point, smooth: bool) {
        self.last_scroll_to = Some((position, smooth));
        self.scroll = self.clamp(position.to_vec2());
    }
}

/// Frame scheduler that only counts calls; the caller delivers frames.
#[derive(Debug, Clone, Default)]
pub struct ManualFrames {
    requested: usize,
    cancelled: usize,
    pending: bool,
    refuse: bool,
}

impl ManualFrames {
    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled
    }

    /// Whether a callback is scheduled and not yet delivered or cancelled.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Make later requests fail, as a host without animation frames would.
    pub fn refuse_requests(&mut self, refuse: bool) {
        self.refuse = refuse;
    }

    /// Take the scheduled callback, as the host would when the frame fires.
    pub fn deliver(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&mut self) -> bool {
        self.requested += 1;
        self.pending = !self.refuse;
        self.pending
    }

    fn cancel_frame(&mut self) {
        self.cancelled += 1;
        self.pending = false;
    }
}

/// A draw call recorded by [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Stroke {
        points: Vec<Point>,
        paint: StrokePaint,
    },
    Region {
        src_rect: Rect,
        dest_origin: Point,
        /// Strokes on the source surface at the time of the copy.
        source_strokes: usize,
    },
}

/// Surface that records draw calls instead of rasterizing.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    size: Size,
    ops: Vec<DrawOp>,
    clears: usize,
    resizes: usize,
}

impl RecordingSurface {
    /// Draw calls since the last clear or resize.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Number of polylines drawn since the last clear or resize.
    pub fn stroke_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Stroke { .. }))
            .count()
    }

    /// Total clears, including those caused by resizing.
    pub fn clears(&self) -> usize {
        self.clears
    }

    pub fn resizes(&self) -> usize {
        self.resizes
    }
}

impl Surface for RecordingSurface {
    fn resize(&mut self, size: Size) {
        self.size = size;
        self.resizes += 1;
        self.clear();
    }

    fn size(&self) -> Size {
        self.size
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.clears += 1;
    }

    fn stroke_polyline(&mut self, points: &[Point], paint: &StrokePaint) {
        if points.is_empty() {
            return;
        }
        self.ops.push(DrawOp::Stroke {
            points: points.to_vec(),
            paint: *paint,
        });
    }

    fn draw_region(&mut self, source: &Self, src_rect: Rect, dest_origin: Point) {
        self.ops.push(DrawOp::Region {
            src_rect,
            dest_origin,
            source_strokes: source.stroke_count(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_clamps_to_document() {
        let mut host = SimulatedHost::new(Size::new(800.0, 600.0), Size::new(800.0, 1000.0));
        host.scroll_by(Vec2::new(0.0, -50.0));
        assert_eq!(host.scroll_offset(), Vec2::ZERO);

        host.scroll_by(Vec2::new(30.0, 900.0));
        assert_eq!(host.scroll_offset(), Vec2::new(0.0, 400.0));
        assert_eq!(host.requested_scroll(), Vec2::new(30.0, 850.0));
    }

    #[test]
    fn test_scroll_to_records_target() {
        let mut host = SimulatedHost::new(Size::new(800.0, 600.0), Size::new(800.0, 3000.0));
        host.scroll_to(Point::new(0.0, 1200.0), true);
        assert_eq!(host.scroll_offset(), Vec2::new(0.0, 1200.0));
        assert_eq!(host.last_scroll_to(), Some((Point::new(0.0, 1200.0), true)));
    }

    #[test]
    fn test_manual_frames() {
        let mut frames = ManualFrames::default();
        frames.request_frame();
        assert!(frames.is_pending());
        assert!(frames.deliver());
        assert!(!frames.deliver());

        frames.request_frame();
        frames.cancel_frame();
        assert!(!frames.is_pending());
        assert_eq!((frames.requested(), frames.cancelled()), (2, 1));
    }
}
