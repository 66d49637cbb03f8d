//! Committed stroke collection with commit, erase, undo and clear.

use crate::config::ToolSettings;
use crate::geometry::{dist_to_polyline_squared, square_around};
use crate::persistence::{load_strokes, save_strokes};
use crate::spatial::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_OBJECTS, QuadTree};
use crate::storage::{KeyValueStorage, StorageResult};
use crate::stroke::{Stroke, StrokeId, Tool};
use kurbo::Rect;
use std::collections::BTreeSet;

/// Result of handing a finished stroke to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// A pen or highlighter stroke was appended.
    Added(StrokeId),
    /// An eraser gesture removed these strokes (possibly none).
    Erased(Vec<StrokeId>),
    /// The stroke had no extent and was dropped.
    Discarded,
}

impl CommitOutcome {
    /// Whether the committed collection changed.
    pub fn changed(&self) -> bool {
        match self {
            CommitOutcome::Added(_) => true,
            CommitOutcome::Erased(ids) => !ids.is_empty(),
            CommitOutcome::Discarded => false,
        }
    }
}

/// Ordered collection of committed strokes and their spatial index.
///
/// Strokes are kept in insertion order, which is also paint order. The index
/// holds positions into that order and is rebuilt whenever a removal shifts
/// them.
#[derive(Debug, Clone)]
pub struct StrokeStore {
    strokes: Vec<Stroke>,
    index: QuadTree<usize>,
    tolerance: f64,
}

impl Default for StrokeStore {
    fn default() -> Self {
        Self::new(Rect::ZERO)
    }
}

impl StrokeStore {
    /// Create an empty store whose index covers `bounds`.
    pub fn new(bounds: Rect) -> Self {
        Self::with_params(bounds, 1.0, DEFAULT_MAX_OBJECTS, DEFAULT_MAX_DEPTH)
    }

    pub fn with_params(bounds: Rect, tolerance: f64, max_objects: usize, max_depth: usize) -> Self {
        Self {
            strokes: Vec::new(),
            index: QuadTree::with_params(bounds, max_objects, max_depth),
            tolerance,
        }
    }

    /// Committed strokes in paint order.
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Get a stroke by ID.
    pub fn get(&self, id: StrokeId) -> Option<&Stroke> {
        self.strokes.iter().find(|stroke| stroke.id() == id)
    }

    /// Union of the areas painted by all strokes, or `None` when empty.
    pub fn document_bounds(&self) -> Option<Rect> {
        self.strokes
            .iter()
            .map(Stroke::ink_bounds)
            .reduce(|acc, rect| acc.union(rect))
    }

    /// Region covered by the index root.
    pub fn index_bounds(&self) -> Rect {
        self.index.bounds()
    }

    /// Strokes whose indexed area may touch `range`.
    pub fn candidates(&self, range: Rect) -> impl Iterator<Item = &Stroke> {
        self.index
            .query(range)
            .into_iter()
            .filter_map(|i| self.strokes.get(i))
    }

    /// Re-root the index over a new document extent.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.rebuild_index_over(bounds);
    }

    /// Replace the whole collection, e.g. after loading.
    pub fn replace(&mut self, strokes: Vec<Stroke>) {
        self.strokes = strokes
            .into_iter()
            .filter(|stroke| stroke.tool() != Tool::Eraser && !stroke.points().is_empty())
            .collect();
        self.rebuild_index();
    }

    /// Finish a gesture's stroke.
    ///
    /// Pen and highlighter strokes are finalized and appended unless they
    /// turn out degenerate. Eraser strokes remove what they touch.
    pub fn commit(&mut self, mut stroke: Stroke) -> CommitOutcome {
        if stroke.tool() == Tool::Eraser {
            return CommitOutcome::Erased(self.erase(&stroke));
        }

        if !stroke.finalize(self.tolerance) {
            log::debug!("Discarding degenerate {} stroke", stroke.tool().name());
            return CommitOutcome::Discarded;
        }

        let id = stroke.id();
        self.index.insert(self.strokes.len(), stroke.ink_bounds());
        self.strokes.push(stroke);
        CommitOutcome::Added(id)
    }

    /// Remove every stroke within reach of the eraser path.
    ///
    /// A stroke is hit when some eraser point is strictly closer to one of
    /// its segments than half the eraser width plus half its own width.
    pub fn erase(&mut self, eraser: &Stroke) -> Vec<StrokeId> {
        let eraser_width = eraser.line_width();
        let mut candidates = BTreeSet::new();
        for point in eraser.points() {
            candidates.extend(self.index.query(square_around(*point, eraser_width)));
        }

        let hit: BTreeSet<usize> = candidates
            .into_iter()
            .filter(|&i| {
                self.strokes
                    .get(i)
                    .is_some_and(|stroke| collides(eraser, stroke))
            })
            .collect();

        if hit.is_empty() {
            return Vec::new();
        }

        let mut removed = Vec::with_capacity(hit.len());
        let mut position = 0;
        self.strokes.retain(|stroke| {
            let keep = !hit.contains(&position);
            if !keep {
                removed.push(stroke.id());
            }
            position += 1;
            keep
        });
        self.rebuild_index();

        log::debug!("Erased {} strokes", removed.len());
        removed
    }

    /// Remove the most recently committed stroke.
    pub fn undo(&mut self) -> Option<Stroke> {
        let stroke = self.strokes.pop()?;
        self.rebuild_index();
        Some(stroke)
    }

    /// Remove every stroke.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.index.clear();
    }

    /// Replace the collection with what is stored under `key`.
    pub fn load<S>(&mut self, storage: &S, key: &str, defaults: &ToolSettings)
    where
        S: KeyValueStorage + ?Sized,
    {
        let strokes = load_strokes(storage, key, defaults);
        self.replace(strokes);
    }

    /// Write the collection under `key`.
    pub fn save<S>(&self, storage: &S, key: &str) -> StorageResult<()>
    where
        S: KeyValueStorage + ?Sized,
    {
        save_strokes(storage, key, &self.strokes)
    }

    fn rebuild_index(&mut self) {
        self.rebuild_index_over(self.index.bounds());
    }

    fn rebuild_index_over(&mut self, bounds: Rect) {
        self.index.rebuild(
            bounds,
            self.strokes
                .iter()
                .enumerate()
                .map(|(i, stroke)| (i, stroke.ink_bounds())),
        );
    }
}

/// True geometric collision between an eraser path and a target stroke.
fn collides(eraser: &Stroke, target: &Stroke) -> bool {
    if target.tool() == Tool::Eraser {
        return false;
    }
    let reach = eraser.line_width() / 2.0 + target.line_width() / 2.0;
    let threshold = reach * reach;

    eraser.points().iter().any(|point| {
        dist_to_polyline_squared(*point, target.points()).is_some_and(|d| d < threshold)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{Rgb, ToolStyle};
    use kurbo::Point;

    fn pen(points: &[(f64, f64)], width: f64) -> Stroke {
        let mut stroke = Stroke::begin(
            ToolStyle::Pen {
                color: Rgb::black(),
                width,
            },
            Point::new(points[0].0, points[0].1),
        );
        for &(x, y) in &points[1..] {
            stroke.push_point(Point::new(x, y));
        }
        stroke
    }

    fn eraser(points: &[(f64, f64)], width: f64) -> Stroke {
        let mut stroke = Stroke::begin(
            ToolStyle::Eraser { width },
            Point::new(points[0].0, points[0].1),
        );
        for &(x, y) in &points[1..] {
            stroke.push_point(Point::new(x, y));
        }
        stroke
    }

    fn store() -> StrokeStore {
        StrokeStore::new(Rect::new(0.0, 0.0, 1000.0, 1000.0))
    }

    #[test]
    fn test_commit_appends_in_order() {
        let mut store = store();
        let a = store.commit(pen(&[(0.0, 0.0), (10.0, 0.0)], 2.0));
        let b = store.commit(pen(&[(0.0, 50.0), (10.0, 50.0)], 2.0));

        assert!(matches!(a, CommitOutcome::Added(_)));
        assert!(b.changed());
        assert_eq!(store.len(), 2);
        assert_eq!(store.strokes()[1].points()[0], Point::new(0.0, 50.0));
    }

    #[test]
    fn test_commit_discards_tap() {
        let mut store = store();
        assert_eq!(store.commit(pen(&[(5.0, 5.0)], 2.0)), CommitOutcome::Discarded);
        assert!(store.is_empty());
    }

    #[test]
    fn test_erase_threshold() {
        let mut store = store();
        store.commit(pen(&[(0.0, 100.0), (200.0, 100.0)], 2.0));

        // Reach is 7.5 + 1.0 = 8.5
        let miss = store.commit(eraser(&[(50.0, 108.6)], 15.0));
        assert_eq!(miss, CommitOutcome::Erased(Vec::new()));
        assert_eq!(store.len(), 1);

        let hit = store.commit(eraser(&[(50.0, 108.4)], 15.0));
        assert!(hit.changed());
        assert!(store.is_empty());
    }

    #[test]
    fn test_erase_at_exact_reach_keeps_stroke() {
        let mut store = store();
        store.commit(pen(&[(0.0, 100.0), (200.0, 100.0)], 2.0));

        let outcome = store.commit(eraser(&[(50.0, 108.5), (150.0, 108.5)], 15.0));
        assert_eq!(outcome, CommitOutcome::Erased(Vec::new()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_erase_wide_stroke_outside_eraser_box() {
        let mut store = store();
        store.commit(pen(&[(0.0, 100.0), (200.0, 100.0)], 20.0));

        // 15 away: outside the eraser box but inside the combined reach of 17.5
        let outcome = store.commit(eraser(&[(50.0, 115.0)], 15.0));
        assert!(outcome.changed());
        assert!(store.is_empty());
    }

    #[test]
    fn test_erase_keeps_order_of_survivors() {
        let mut store = store();
        for i in 0..5 {
            let y = i as f64 * 100.0;
            store.commit(pen(&[(0.0, y), (50.0, y)], 2.0));
        }

        store.commit(eraser(&[(25.0, 100.0), (25.0, 300.0)], 10.0));
        let ys: Vec<f64> = store.strokes().iter().map(|s| s.points()[0].y).collect();
        assert_eq!(ys, vec![0.0, 200.0, 400.0]);

        // Index still finds the survivors at their new positions
        let found: Vec<f64> = store
            .candidates(Rect::new(0.0, 395.0, 50.0, 405.0))
            .map(|s| s.points()[0].y)
            .collect();
        assert!(found.contains(&400.0));
    }

    #[test]
    fn test_erase_single_point_legacy_stroke() {
        let mut store = store();
        let dot = Stroke::from_parts(
            StrokeId::new(),
            ToolStyle::Pen {
                color: Rgb::black(),
                width: 4.0,
            },
            vec![Point::new(10.0, 10.0)],
        )
        .unwrap();
        store.replace(vec![dot]);

        store.commit(eraser(&[(16.0, 10.0)], 10.0));
        assert!(store.is_empty());
    }

    #[test]
    fn test_undo() {
        let mut store = store();
        assert!(store.undo().is_none());

        store.commit(pen(&[(0.0, 0.0), (10.0, 0.0)], 2.0));
        let CommitOutcome::Added(b) = store.commit(pen(&[(0.0, 9.0), (10.0, 9.0)], 2.0)) else {
            panic!("expected stroke to be added");
        };

        assert_eq!(store.undo().map(|s| s.id()), Some(b));
        assert_eq!(store.len(), 1);
        assert_eq!(store.candidates(Rect::new(0.0, 8.0, 10.0, 10.0)).count(), 1);
    }

    #[test]
    fn test_clear_and_bounds() {
        let mut store = store();
        store.commit(pen(&[(10.0, 10.0), (20.0, 30.0)], 2.0));
        store.commit(pen(&[(100.0, 5.0), (120.0, 6.0)], 2.0));

        assert_eq!(store.document_bounds(), Some(Rect::new(9.0, 4.0, 121.0, 31.0)));

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.document_bounds(), None);
    }

    #[test]
    fn test_set_bounds_rebuilds_index() {
        let mut store = store();
        store.commit(pen(&[(1500.0, 1500.0), (1600.0, 1500.0)], 2.0));
        store.set_bounds(Rect::new(0.0, 0.0, 2000.0, 2000.0));

        assert_eq!(store.index_bounds(), Rect::new(0.0, 0.0, 2000.0, 2000.0));
        assert_eq!(store.candidates(Rect::new(1550.0, 1490.0, 1560.0, 1510.0)).count(), 1);
    }
}
