use crate::core::{
    bounds::Bounds,
    constants::{MAX_DEPTH, MAX_ELEMENTS},
    geo::Point,
};

/// Anything the quad-tree can index: it only needs a planar point.
pub trait QuadTreeItem {
    fn point(&self) -> Point;
}

impl<I: QuadTreeItem + ?Sized> QuadTreeItem for std::sync::Arc<I> {
    fn point(&self) -> Point {
        (**self).point()
    }
}

/// A quad-tree over points.
///
/// Leaves hold up to [`MAX_ELEMENTS`] items and split into four quadrants
/// when they overflow, unless they already sit at [`MAX_DEPTH`]. Items are
/// identified by `PartialEq` for removal.
///
/// The tree is not synchronized; mutation requires `&mut self`.
#[derive(Debug, Clone)]
pub struct PointQuadTree<I> {
    bounds: Bounds,
    depth: usize,
    items: Vec<I>,
    /// `[top-left, top-right, bottom-left, bottom-right]` once split
    children: Option<Box<[PointQuadTree<I>; 4]>>,
}

impl<I: QuadTreeItem + PartialEq> PointQuadTree<I> {
    /// Creates an empty tree covering `bounds`
    pub fn new(bounds: Bounds) -> Self {
        Self::with_depth(bounds, 0)
    }

    /// Creates an empty tree covering the `[0,1]×[0,1]` projection space
    pub fn with_unit_bounds() -> Self {
        Self::new(Bounds::unit())
    }

    fn with_depth(bounds: Bounds, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Inserts an item. Items whose point lies outside the tree's bounds are
    /// ignored.
    pub fn add(&mut self, item: I) {
        let point = item.point();
        if self.bounds.contains(&point) {
            self.insert(point, item);
        }
    }

    fn insert(&mut self, point: Point, item: I) {
        if let Some(children) = self.children.as_mut() {
            let quadrant = Self::quadrant(&self.bounds, &point);
            children[quadrant].insert(point, item);
            return;
        }

        self.items.push(item);
        if self.items.len() > MAX_ELEMENTS && self.depth < MAX_DEPTH {
            self.split();
        }
    }

    /// Index of the child holding `point`: top half when `y < mid_y`, then
    /// left half when `x < mid_x`.
    fn quadrant(bounds: &Bounds, point: &Point) -> usize {
        let top = point.y < bounds.mid_y();
        let left = point.x < bounds.mid_x();
        match (top, left) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        }
    }

    fn split(&mut self) {
        let depth = self.depth + 1;
        let [tl, tr, bl, br] = self.bounds.quadrants();
        self.children = Some(Box::new([
            Self::with_depth(tl, depth),
            Self::with_depth(tr, depth),
            Self::with_depth(bl, depth),
            Self::with_depth(br, depth),
        ]));

        for item in std::mem::take(&mut self.items) {
            let point = item.point();
            self.insert(point, item);
        }
    }

    /// Removes an item. Returns `false` if its point is outside the tree's
    /// bounds or the item is not present.
    pub fn remove(&mut self, item: &I) -> bool {
        let point = item.point();
        if self.bounds.contains(&point) {
            self.remove_at(&point, item)
        } else {
            false
        }
    }

    fn remove_at(&mut self, point: &Point, item: &I) -> bool {
        if let Some(children) = self.children.as_mut() {
            let quadrant = Self::quadrant(&self.bounds, point);
            return children[quadrant].remove_at(point, item);
        }

        match self.items.iter().position(|existing| existing == item) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drops every item and child, leaving a single empty leaf
    pub fn clear(&mut self) {
        self.children = None;
        self.items.clear();
    }

    /// Returns every item whose point lies within `search_bounds`
    pub fn search(&self, search_bounds: &Bounds) -> Vec<&I> {
        let mut results = Vec::new();
        self.search_into(search_bounds, &mut results);
        results
    }

    fn search_into<'a>(&'a self, search_bounds: &Bounds, results: &mut Vec<&'a I>) {
        if !self.bounds.intersects(search_bounds) {
            return;
        }

        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.search_into(search_bounds, results);
            }
        } else if search_bounds.contains_bounds(&self.bounds) {
            results.extend(self.items.iter());
        } else {
            results.extend(
                self.items
                    .iter()
                    .filter(|item| search_bounds.contains(&item.point())),
            );
        }
    }

    /// Number of items in the tree
    pub fn len(&self) -> usize {
        match self.children.as_ref() {
            Some(children) => children.iter().map(PointQuadTree::len).sum(),
            None => self.items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth of the deepest leaf, 0 for an unsplit tree
    pub fn depth(&self) -> usize {
        match self.children.as_ref() {
            Some(children) => children
                .iter()
                .map(PointQuadTree::depth)
                .max()
                .unwrap_or(self.depth),
            None => self.depth,
        }
    }

    /// Child nodes, if this node has split
    pub fn children(&self) -> Option<&[PointQuadTree<I>; 4]> {
        self.children.as_deref()
    }

    /// Items held directly by this node (always empty once split)
    pub fn node_items(&self) -> &[I] {
        &self.items
    }
}

impl<I: QuadTreeItem + PartialEq> Default for PointQuadTree<I> {
    fn default() -> Self {
        Self::with_unit_bounds()
    }
}
