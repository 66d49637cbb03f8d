//! Region quadtree over bounding boxes.
//!
//! The tree only stores `(key, bounds)` pairs; the objects themselves are
//! owned elsewhere. Queries are conservative: they may return keys whose
//! boxes do not actually intersect the query, but never miss one that does.

use kurbo::Rect;

/// Default number of items a node holds before it splits.
pub const DEFAULT_MAX_OBJECTS: usize = 10;

/// Default maximum subdivision depth.
pub const DEFAULT_MAX_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Entry<T> {
    key: T,
    bounds: Rect,
}

#[derive(Debug, Clone)]
struct Node<T> {
    bounds: Rect,
    depth: usize,
    /// Items that straddle a midline (or that arrived before the split).
    items: Vec<Entry<T>>,
    /// Top-left, top-right, bottom-left, bottom-right.
    children: Option<Box<[Node<T>; 4]>>,
}

impl<T: Copy> Node<T> {
    fn new(bounds: Rect, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    fn midlines(&self) -> (f64, f64) {
        (
            self.bounds.x0 + self.bounds.width() / 2.0,
            self.bounds.y0 + self.bounds.height() / 2.0,
        )
    }

    /// Index of the single child quadrant that fully contains `rect`.
    fn fit_index(&self, rect: Rect) -> Option<usize> {
        let (mid_x, mid_y) = self.midlines();

        let top = rect.y1 < mid_y;
        let bottom = rect.y0 > mid_y;
        let left = rect.x1 < mid_x;
        let right = rect.x0 > mid_x;

        match (top, bottom, left, right) {
            (true, _, true, _) => Some(0),
            (true, _, _, true) => Some(1),
            (_, true, true, _) => Some(2),
            (_, true, _, true) => Some(3),
            _ => None,
        }
    }

    /// Child quadrants a query box can reach.
    ///
    /// For a box contained in one quadrant this is exactly `fit_index`.
    fn reached(&self, rect: Rect) -> [bool; 4] {
        let (mid_x, mid_y) = self.midlines();

        let top = rect.y0 < mid_y;
        let bottom = rect.y1 > mid_y;
        let left = rect.x0 < mid_x;
        let right = rect.x1 > mid_x;

        [top && left, top && right, bottom && left, bottom && right]
    }

    fn split(&mut self) {
        let Rect { x0, y0, x1, y1 } = self.bounds;
        let (mid_x, mid_y) = self.midlines();
        let depth = self.depth + 1;

        self.children = Some(Box::new([
            Node::new(Rect::new(x0, y0, mid_x, mid_y), depth),
            Node::new(Rect::new(mid_x, y0, x1, mid_y), depth),
            Node::new(Rect::new(x0, mid_y, mid_x, y1), depth),
            Node::new(Rect::new(mid_x, mid_y, x1, y1), depth),
        ]));
    }

    fn insert(&mut self, entry: Entry<T>, max_objects: usize, max_depth: usize) {
        if self.children.is_some() {
            if let Some(index) = self.fit_index(entry.bounds) {
                if let Some(children) = self.children.as_mut() {
                    children[index].insert(entry, max_objects, max_depth);
                }
                return;
            }
        }

        self.items.push(entry);

        if self.items.len() > max_objects && self.depth < max_depth && self.children.is_none() {
            self.split();

            let pending = std::mem::take(&mut self.items);
            for entry in pending {
                match (self.fit_index(entry.bounds), self.children.as_mut()) {
                    (Some(index), Some(children)) => {
                        children[index].insert(entry, max_objects, max_depth)
                    }
                    _ => self.items.push(entry),
                }
            }
        }
    }

    fn query(&self, range: Rect, out: &mut Vec<T>) {
        out.extend(self.items.iter().map(|entry| entry.key));

        if let Some(children) = &self.children {
            for (child, reached) in children.iter().zip(self.reached(range)) {
                if reached {
                    child.query(range, out);
                }
            }
        }
    }

    fn node_count(&self) -> usize {
        1 + self
            .children
            .as_ref()
            .map(|children| children.iter().map(Node::node_count).sum())
            .unwrap_or(0)
    }
}

/// A region quadtree keyed by `T`.
#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    root: Node<T>,
    max_objects: usize,
    max_depth: usize,
    len: usize,
}

impl<T: Copy> QuadTree<T> {
    /// Create an empty tree covering `bounds` with default parameters.
    pub fn new(bounds: Rect) -> Self {
        Self::with_params(bounds, DEFAULT_MAX_OBJECTS, DEFAULT_MAX_DEPTH)
    }

    /// Create an empty tree with explicit split capacity and depth limit.
    pub fn with_params(bounds: Rect, max_objects: usize, max_depth: usize) -> Self {
        Self {
            root: Node::new(bounds, 0),
            max_objects: max_objects.max(1),
            max_depth,
            len: 0,
        }
    }

    /// Region covered by the root node.
    pub fn bounds(&self) -> Rect {
        self.root.bounds
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the tree holds no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Index `key` under its bounding box.
    ///
    /// Boxes outside the root region are accepted; they end up in whichever
    /// quadrant the midline tests select, or at the root.
    pub fn insert(&mut self, key: T, bounds: Rect) {
        self.root
            .insert(Entry { key, bounds }, self.max_objects, self.max_depth);
        self.len += 1;
    }

    /// Candidate keys whose boxes may intersect `range`.
    pub fn query(&self, range: Rect) -> Vec<T> {
        let mut out = Vec::new();
        self.root.query(range, &mut out);
        out
    }

    /// Remove every item and collapse back to a single leaf.
    pub fn clear(&mut self) {
        self.root.items.clear();
        self.root.children = None;
        self.len = 0;
    }

    /// Rebuild from scratch over a new region.
    pub fn rebuild<I>(&mut self, bounds: Rect, items: I)
    where
        I: IntoIterator<Item = (T, Rect)>,
    {
        self.clear();
        self.root.bounds = bounds;
        for (key, rect) in items {
            self.insert(key, rect);
        }
    }
}
