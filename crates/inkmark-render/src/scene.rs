//! Vello-backed surface.
//!
//! A surface is a retained `vello::Scene` plus a logical size. Clearing
//! resets the scene; copying a region appends the source scene under a
//! clip with a translation, so the live layer never rasterizes anything
//! itself.

use inkmark_core::render::{Blend, StrokePaint, Surface};
use kurbo::{Affine, BezPath, Circle, Point, Rect, Size, Stroke};
use peniko::{BlendMode, Compose, Fill, Mix};
use vello::Scene;

/// Surface that records into a vello scene.
pub struct SceneSurface {
    /// The scene being built.
    scene: Scene,
    /// Logical size in pixels.
    size: Size,
    /// Polylines painted since the last clear.
    strokes: usize,
    /// Region copies since the last clear.
    regions: usize,
}

impl Default for SceneSurface {
    fn default() -> Self {
        Self::new(Size::ZERO)
    }
}

impl SceneSurface {
    pub fn new(size: Size) -> Self {
        Self {
            scene: Scene::new(),
            size,
            strokes: 0,
            regions: 0,
        }
    }

    /// Get the built scene.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes
    }

    pub fn region_count(&self) -> usize {
        self.regions
    }

    fn bounds(&self) -> Rect {
        self.size.to_rect()
    }
}

impl std::fmt::Debug for SceneSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneSurface")
            .field("size", &self.size)
            .field("strokes", &self.strokes)
            .field("regions", &self.regions)
            .finish()
    }
}

fn polyline(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        path.move_to(*first);
        for p in iter {
            path.line_to(*p);
        }
    }
    path
}

/// Area a polyline can touch once stroked.
fn ink_rect(points: &[Point], width: f64) -> Rect {
    let rect = points
        .iter()
        .skip(1)
        .fold(Rect::from_points(points[0], points[0]), |r, p| r.union_pt(*p));
    let half = width / 2.0;
    rect.inflate(half, half)
}

impl Surface for SceneSurface {
    fn resize(&mut self, size: Size) {
        log::debug!("Scene surface resized to {}x{}", size.width, size.height);
        self.size = size;
        self.clear();
    }

    fn size(&self) -> Size {
        self.size
    }

    fn clear(&mut self) {
        self.scene.reset();
        self.strokes = 0;
        self.regions = 0;
    }

    fn stroke_polyline(&mut self, points: &[Point], paint: &StrokePaint) {
        if points.is_empty() || paint.width <= 0.0 {
            return;
        }

        let color = paint.color.with_alpha(paint.alpha);
        let darken = paint.blend == Blend::Darken;
        if darken {
            let clip = ink_rect(points, paint.width).intersect(self.bounds());
            self.scene.push_layer(
                BlendMode::new(Mix::Darken, Compose::SrcOver),
                1.0,
                Affine::IDENTITY,
                &clip,
            );
        }

        if points.len() == 1 {
            let dot = Circle::new(points[0], paint.width / 2.0);
            self.scene
                .fill(Fill::NonZero, Affine::IDENTITY, color, None, &dot);
        } else {
            let stroke = Stroke::new(paint.width)
                .with_caps(paint.cap)
                .with_join(paint.join);
            self.scene
                .stroke(&stroke, Affine::IDENTITY, color, None, &polyline(points));
        }

        if darken {
            self.scene.pop_layer();
        }
        self.strokes += 1;
    }

    fn draw_region(&mut self, source: &Self, src_rect: Rect, dest_origin: Point) {
        let dest = Rect::from_origin_size(dest_origin, src_rect.size()).intersect(self.bounds());
        if dest.is_zero_area() {
            return;
        }

        let shift = Affine::translate(dest_origin - src_rect.origin());
        self.scene
            .push_layer(BlendMode::default(), 1.0, Affine::IDENTITY, &dest);
        self.scene.append(&source.scene, Some(shift));
        self.scene.pop_layer();
        self.regions += 1;
    }
}
