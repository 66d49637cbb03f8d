//! Two-layer rendering: a document-sized committed layer and a
//! viewport-sized live layer composited every active frame.

use crate::stroke::{Rgb, Stroke, ToolStyle};
use crate::viewport::ViewportMetrics;
use kurbo::{Cap, Join, Point, Rect, Size, Vec2};
use thiserror::Error;

/// Color of the live eraser indicator.
pub const ERASER_INDICATOR_COLOR: Rgb = Rgb::new(200, 0, 0);

/// Opacity of the live eraser indicator.
pub const ERASER_INDICATOR_ALPHA: f64 = 0.6;

/// Errors from rendering backends.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Surface error: {0}")]
    Surface(String),
}

/// How a stroke combines with what is already on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blend {
    /// Ordinary source-over alpha blending.
    #[default]
    Normal,
    /// Keep the darker of source and destination per channel.
    Darken,
}

/// Paint parameters for one polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokePaint {
    pub color: Rgb,
    pub alpha: f64,
    pub width: f64,
    pub blend: Blend,
    pub cap: Cap,
    pub join: Join,
}

impl StrokePaint {
    /// Paint for a stroke. Live erasers get the translucent red indicator;
    /// committed erasers are never painted.
    pub fn for_stroke(stroke: &Stroke, live: bool) -> Option<Self> {
        let (color, alpha, blend) = match *stroke.style() {
            ToolStyle::Pen { color, .. } => (color, 1.0, Blend::Normal),
            ToolStyle::Highlighter { color, opacity, .. } => (color, opacity, Blend::Darken),
            ToolStyle::Eraser { .. } if live => {
                (ERASER_INDICATOR_COLOR, ERASER_INDICATOR_ALPHA, Blend::Normal)
            }
            ToolStyle::Eraser { .. } => return None,
        };

        Some(Self {
            color,
            alpha,
            width: stroke.line_width(),
            blend,
            cap: Cap::Round,
            join: Join::Round,
        })
    }
}

/// A resizable raster target.
pub trait Surface {
    /// Resize the surface. Resizing clears it.
    fn resize(&mut self, size: Size);

    fn size(&self) -> Size;

    /// Clear to fully transparent.
    fn clear(&mut self);

    /// Stroke an open polyline. A single point paints a round dot.
    fn stroke_polyline(&mut self, points: &[Point], paint: &StrokePaint);

    /// Draw `src_rect` of `source` with its top-left at `dest_origin`.
    fn draw_region(&mut self, source: &Self, src_rect: Rect, dest_origin: Point);
}

/// Host timer that can run one callback on the next animation frame.
pub trait FrameScheduler {
    /// Schedule a frame callback. Returns false if the host refused.
    fn request_frame(&mut self) -> bool;

    /// Cancel the scheduled callback, if any.
    fn cancel_frame(&mut self);
}

impl<F: FrameScheduler + ?Sized> FrameScheduler for Box<F> {
    fn request_frame(&mut self) -> bool {
        (**self).request_frame()
    }

    fn cancel_frame(&mut self) {
        (**self).cancel_frame()
    }
}

/// Coalesces frame requests so at most one is pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameRequest {
    pending: bool,
}

impl FrameRequest {
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Request a frame unless one is already pending. Returns whether a
    /// new callback was scheduled.
    pub fn request<F: FrameScheduler + ?Sized>(&mut self, scheduler: &mut F) -> bool {
        if self.pending {
            return false;
        }
        self.pending = scheduler.request_frame();
        self.pending
    }

    /// Cancel the pending callback, if any.
    pub fn cancel<F: FrameScheduler + ?Sized>(&mut self, scheduler: &mut F) {
        if self.pending {
            self.pending = false;
            scheduler.cancel_frame();
        }
    }

    /// Mark the pending callback as delivered. Returns whether one was pending.
    pub fn fired(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

/// Owns both layers and knows how to paint strokes onto them.
#[derive(Debug)]
pub struct RenderPipeline<S> {
    committed: S,
    live: S,
    frame: FrameRequest,
}

impl<S: Surface> RenderPipeline<S> {
    pub fn new(committed: S, live: S) -> Self {
        Self {
            committed,
            live,
            frame: FrameRequest::default(),
        }
    }

    /// Full-document layer of finalized strokes.
    pub fn committed(&self) -> &S {
        &self.committed
    }

    /// Viewport-sized layer shown to the user.
    pub fn live(&self) -> &S {
        &self.live
    }

    pub fn frame_pending(&self) -> bool {
        self.frame.is_pending()
    }

    /// Resize the live layer to the viewport.
    pub fn resize_viewport(&mut self, size: Size) {
        if self.live.size() != size {
            self.live.resize(size);
        }
    }

    /// Resize the committed layer to the document and repaint it.
    pub fn resize_document(&mut self, size: Size, strokes: &[Stroke]) {
        self.committed.resize(size);
        self.redraw_committed(strokes);
    }

    /// Clear the committed layer and repaint every stroke in order.
    pub fn redraw_committed(&mut self, strokes: &[Stroke]) {
        self.committed.clear();
        for stroke in strokes {
            paint_stroke(&mut self.committed, stroke, Vec2::ZERO, false);
        }
    }

    /// Paint the live layer: the visible slice of the committed layer plus
    /// the in-progress stroke, shifted into viewport coordinates.
    pub fn compose(&mut self, metrics: &ViewportMetrics, live_stroke: Option<&Stroke>) {
        self.live.clear();

        let committed_size = self.committed.size();
        if committed_size.width > 0.0 && committed_size.height > 0.0 {
            self.live
                .draw_region(&self.committed, metrics.visible_rect(), Point::ZERO);
        }

        if let Some(stroke) = live_stroke {
            paint_stroke(&mut self.live, stroke, -metrics.scroll, true);
        }
    }

    /// Ask for a live-layer frame, coalescing with any pending one.
    pub fn request_frame<F: FrameScheduler + ?Sized>(&mut self, scheduler: &mut F) -> bool {
        self.frame.request(scheduler)
    }

    /// Drop the pending live-layer frame.
    pub fn cancel_frame<F: FrameScheduler + ?Sized>(&mut self, scheduler: &mut F) {
        self.frame.cancel(scheduler);
    }

    /// Run a delivered frame callback. Frames that were cancelled in the
    /// meantime are skipped; returns whether the live layer was painted.
    pub fn on_frame(&mut self, metrics: &ViewportMetrics, live_stroke: Option<&Stroke>) -> bool {
        if !self.frame.fired() {
            return false;
        }
        self.compose(metrics, live_stroke);
        true
    }
}

fn paint_stroke<S: Surface>(surface: &mut S, stroke: &Stroke, offset: Vec2, live: bool) {
    let Some(paint) = StrokePaint::for_stroke(stroke, live) else {
        return;
    };
    if offset == Vec2::ZERO {
        surface.stroke_polyline(stroke.points(), &paint);
    } else {
        let shifted: Vec<Point> = stroke.points().iter().map(|p| *p + offset).collect();
        surface.stroke_polyline(&shifted, &paint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{DrawOp, ManualFrames, RecordingSurface};
    use crate::stroke::{HIGHLIGHTER_OPACITY, StrokeId};

    fn stroke(style: ToolStyle, points: &[(f64, f64)]) -> Stroke {
        Stroke::from_parts(
            StrokeId::new(),
            style,
            points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        )
        .unwrap()
    }

    fn pen() -> ToolStyle {
        ToolStyle::Pen {
            color: Rgb::black(),
            width: 2.0,
        }
    }

    fn pipeline() -> RenderPipeline<RecordingSurface> {
        RenderPipeline::new(RecordingSurface::default(), RecordingSurface::default())
    }

    #[test]
    fn test_paint_styles() {
        let highlighter = stroke(
            ToolStyle::Highlighter {
                color: Rgb::new(0, 255, 0),
                width: 20.0,
                opacity: HIGHLIGHTER_OPACITY,
            },
            &[(0.0, 0.0), (10.0, 0.0)],
        );
        let paint = StrokePaint::for_stroke(&highlighter, false).unwrap();
        assert_eq!(paint.blend, Blend::Darken);
        assert!((paint.alpha - 0.4).abs() < f64::EPSILON);
        assert_eq!(paint.cap, Cap::Round);

        let eraser = stroke(ToolStyle::Eraser { width: 15.0 }, &[(0.0, 0.0)]);
        assert!(StrokePaint::for_stroke(&eraser, false).is_none());
        let indicator = StrokePaint::for_stroke(&eraser, true).unwrap();
        assert_eq!(indicator.color, ERASER_INDICATOR_COLOR);
        assert!((indicator.alpha - ERASER_INDICATOR_ALPHA).abs() < f64::EPSILON);
    }

    #[test]
    fn test_redraw_committed_in_order() {
        let mut pipeline = pipeline();
        let strokes = vec![
            stroke(pen(), &[(0.0, 0.0), (1.0, 1.0)]),
            stroke(pen(), &[(5.0, 5.0), (6.0, 6.0)]),
        ];
        pipeline.resize_document(Size::new(100.0, 100.0), &strokes);

        let committed = pipeline.committed();
        assert_eq!(committed.size(), Size::new(100.0, 100.0));
        assert_eq!(committed.stroke_count(), 2);
        assert_eq!(
            committed.ops()[1],
            DrawOp::Stroke {
                points: vec![Point::new(5.0, 5.0), Point::new(6.0, 6.0)],
                paint: StrokePaint::for_stroke(&strokes[1], false).unwrap(),
            }
        );
    }

    #[test]
    fn test_compose_blits_visible_region_and_shifts_live_stroke() {
        let mut pipeline = pipeline();
        pipeline.resize_document(Size::new(800.0, 3000.0), &[]);
        pipeline.resize_viewport(Size::new(800.0, 600.0));

        let metrics = ViewportMetrics {
            viewport: Size::new(800.0, 600.0),
            scroll: Vec2::new(0.0, 1000.0),
            document: Size::new(800.0, 3000.0),
        };
        let live = stroke(pen(), &[(10.0, 1010.0), (20.0, 1020.0)]);
        pipeline.compose(&metrics, Some(&live));

        let ops = pipeline.live().ops();
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            ops[0],
            DrawOp::Region { src_rect, dest_origin, .. }
                if src_rect == Rect::new(0.0, 1000.0, 800.0, 1600.0) && dest_origin == Point::ZERO
        ));
        let DrawOp::Stroke { points, .. } = &ops[1] else {
            panic!("expected live stroke");
        };
        assert_eq!(points, &vec![Point::new(10.0, 10.0), Point::new(20.0, 20.0)]);
    }

    #[test]
    fn test_frame_requests_coalesce() {
        let mut pipeline = pipeline();
        let mut frames = ManualFrames::default();

        assert!(pipeline.request_frame(&mut frames));
        assert!(!pipeline.request_frame(&mut frames));
        assert_eq!(frames.requested(), 1);

        let metrics = ViewportMetrics::default();
        assert!(pipeline.on_frame(&metrics, None));
        assert!(!pipeline.on_frame(&metrics, None));

        pipeline.request_frame(&mut frames);
        pipeline.cancel_frame(&mut frames);
        assert_eq!(frames.cancelled(), 1);
        assert!(!pipeline.on_frame(&metrics, None));
    }

    #[test]
    fn test_refused_frame_is_not_left_pending() {
        let mut pipeline = pipeline();
        let mut frames = ManualFrames::default();

        frames.refuse_requests(true);
        assert!(!pipeline.request_frame(&mut frames));
        assert!(!frames.is_pending());

        frames.refuse_requests(false);
        assert!(pipeline.request_frame(&mut frames));
        assert_eq!(frames.requested(), 2);
        assert!(pipeline.on_frame(&ViewportMetrics::default(), None));
    }
}
