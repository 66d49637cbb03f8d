//! Stateless geometry helpers: distances, bounds and polyline simplification.

use kurbo::{Point, Rect, Vec2};

/// Squared distance from `point` to the segment `a`→`b`.
///
/// A zero-length segment degrades to the point-to-point distance.
pub fn dist_to_segment_squared(point: Point, a: Point, b: Point) -> f64 {
    let seg = Vec2::new(b.x - a.x, b.y - a.y);
    let pv = Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq == 0.0 {
        return pv.hypot2();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    (point - proj).hypot2()
}

/// Distance from `point` to the segment `a`→`b`.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    dist_to_segment_squared(point, a, b).sqrt()
}

/// Minimum squared distance from `point` to a polyline.
///
/// A single-point polyline is treated as a zero-length segment.
/// Returns `None` for an empty polyline.
pub fn dist_to_polyline_squared(point: Point, points: &[Point]) -> Option<f64> {
    match points {
        [] => None,
        [only] => Some((point - *only).hypot2()),
        _ => Some(
            points
                .windows(2)
                .map(|w| dist_to_segment_squared(point, w[0], w[1]))
                .fold(f64::INFINITY, f64::min),
        ),
    }
}

/// Axis-aligned bounding box of a point list.
pub fn bounding_box(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let mut min_x = first.x;
    let mut min_y = first.y;
    let mut max_x = first.x;
    let mut max_y = first.y;

    for point in &points[1..] {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }

    Some(Rect::new(min_x, min_y, max_x, max_y))
}

/// Square box of side `size` centered on `center`.
pub fn square_around(center: Point, size: f64) -> Rect {
    let half = size / 2.0;
    Rect::new(center.x - half, center.y - half, center.x + half, center.y + half)
}

/// Ramer-Douglas-Peucker polyline simplification.
///
/// The first and last points are always kept. A point survives only if its
/// distance to the chord segment is strictly greater than `tolerance`, so
/// every dropped point lies within `tolerance` of the result.
pub fn simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_index = 0;

    for (i, point) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = point_to_segment_dist(*point, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    if max_dist > tolerance {
        let mut left = simplify(&points[..=max_index], tolerance);
        let right = simplify(&points[max_index..], tolerance);

        // Join point appears at the end of `left` and the start of `right`
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}
