//! Viewport and document geometry tracking.

use kurbo::{Point, Rect, Size, Vec2};

/// Scrollable page the overlay sits on.
pub trait ScrollHost {
    /// Size of the visible area.
    fn viewport_size(&self) -> Size;

    /// Current scroll offset of the visible area within the document.
    fn scroll_offset(&self) -> Vec2;

    /// Candidate measurements of the full content extent.
    ///
    /// Content can grow asynchronously, so hosts report every measurement
    /// they have and the document extent is their maximum.
    fn content_sizes(&self) -> Vec<Size>;

    /// Scroll by a relative amount.
    fn scroll_by(&mut self, delta: Vec2);

    /// Scroll so that `position` is at the top-left of the viewport.
    fn scroll_to(&mut self, position: Point, smooth: bool);
}

/// One measurement of the six values the overlay depends on.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportMetrics {
    pub viewport: Size,
    pub scroll: Vec2,
    pub document: Size,
}

impl ViewportMetrics {
    /// Measure a host.
    pub fn measure<H: ScrollHost + ?Sized>(host: &H) -> Self {
        let viewport = host.viewport_size();
        let document = host
            .content_sizes()
            .into_iter()
            .fold(viewport, |acc, size| {
                Size::new(acc.width.max(size.width), acc.height.max(size.height))
            });

        Self {
            viewport,
            scroll: host.scroll_offset(),
            document,
        }
    }

    /// Visible region in document coordinates.
    pub fn visible_rect(&self) -> Rect {
        Rect::from_origin_size(self.scroll.to_point(), self.viewport)
    }

    /// Full document region.
    pub fn document_rect(&self) -> Rect {
        self.document.to_rect()
    }
}

/// What changed since the previous tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViewportChange {
    Unchanged,
    /// Viewport size or scroll offset changed; the document did not.
    Moved,
    /// The document extent changed.
    DocumentResized,
}

/// Remembers the last metrics and classifies each new measurement.
#[derive(Debug, Clone, Default)]
pub struct ViewportTracker {
    last: Option<ViewportMetrics>,
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded metrics, or zeros before the first tick.
    pub fn metrics(&self) -> ViewportMetrics {
        self.last.unwrap_or_default()
    }

    /// Record `metrics` and report what changed.
    pub fn update(&mut self, metrics: ViewportMetrics) -> ViewportChange {
        let change = match self.last {
            None => ViewportChange::DocumentResized,
            Some(last) if last.document != metrics.document => ViewportChange::DocumentResized,
            Some(last) if last != metrics => ViewportChange::Moved,
            Some(_) => ViewportChange::Unchanged,
        };
        if change != ViewportChange::Unchanged {
            log::debug!("Viewport {:?}: {:?}", change, metrics);
        }
        self.last = Some(metrics);
        change
    }

    /// Measure `host` and record the result.
    pub fn tick<H: ScrollHost + ?Sized>(&mut self, host: &H) -> ViewportChange {
        self.update(ViewportMetrics::measure(host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SimulatedHost;

    #[test]
    fn test_measure_takes_max_content_size() {
        let mut host = SimulatedHost::new(Size::new(800.0, 600.0), Size::new(800.0, 3000.0));
        host.push_content_size(Size::new(1200.0, 2500.0));

        let metrics = ViewportMetrics::measure(&host);
        assert_eq!(metrics.document, Size::new(1200.0, 3000.0));
        assert_eq!(metrics.viewport, Size::new(800.0, 600.0));
    }

    #[test]
    fn test_document_never_smaller_than_viewport() {
        let host = SimulatedHost::new(Size::new(800.0, 600.0), Size::new(400.0, 300.0));
        assert_eq!(ViewportMetrics::measure(&host).document, Size::new(800.0, 600.0));
    }

    #[test]
    fn test_tracker_classifies_changes() {
        let mut host = SimulatedHost::new(Size::new(800.0, 600.0), Size::new(800.0, 3000.0));
        let mut tracker = ViewportTracker::new();

        assert_eq!(tracker.tick(&host), ViewportChange::DocumentResized);
        assert_eq!(tracker.tick(&host), ViewportChange::Unchanged);

        host.scroll_by(Vec2::new(0.0, 120.0));
        assert_eq!(tracker.tick(&host), ViewportChange::Moved);
        assert_eq!(tracker.metrics().scroll, Vec2::new(0.0, 120.0));

        host.set_viewport_size(Size::new(700.0, 600.0));
        assert_eq!(tracker.tick(&host), ViewportChange::Moved);

        host.set_document_size(Size::new(800.0, 4000.0));
        assert_eq!(tracker.tick(&host), ViewportChange::DocumentResized);
    }

    #[test]
    fn test_visible_and_document_rects() {
        let metrics = ViewportMetrics {
            viewport: Size::new(100.0, 100.0),
            scroll: Vec2::new(10.0, 200.0),
            document: Size::new(500.0, 1000.0),
        };
        assert_eq!(metrics.visible_rect(), Rect::new(10.0, 200.0, 110.0, 300.0));
        assert_eq!(metrics.document_rect(), Rect::new(0.0, 0.0, 500.0, 1000.0));
    }
}
