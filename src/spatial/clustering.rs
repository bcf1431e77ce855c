use std::fmt;
use std::sync::Arc;

use fxhash::FxHashSet;

use crate::{
    core::{
        bounds::Bounds,
        constants::{DEFAULT_MAX_DISTANCE_AT_ZOOM, TILE_SIZE},
        geo::{LatLng, Point},
        projection::{discrete_zoom, SphericalMercatorProjection},
    },
    spatial::quadtree::{PointQuadTree, QuadTreeItem},
    traits::{Algorithm, Cluster, ClusterItem, ClusterRef, Clusters},
    ClusterError, Result,
};

/// A cluster with a fixed centre and a growable list of members
pub struct StaticCluster<T> {
    center: LatLng,
    items: Vec<Arc<T>>,
}

impl<T> StaticCluster<T> {
    pub fn new(center: LatLng) -> Self {
        Self {
            center,
            items: Vec::new(),
        }
    }

    pub fn add(&mut self, item: Arc<T>) {
        self.items.push(item);
    }

    /// Removes an item by identity. Returns whether it was a member.
    pub fn remove(&mut self, item: &Arc<T>) -> bool {
        match self.items.iter().position(|member| Arc::ptr_eq(member, item)) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }
}

impl<T: ClusterItem> Cluster<T> for StaticCluster<T> {
    fn position(&self) -> LatLng {
        self.center
    }

    fn items(&self) -> &[Arc<T>] {
        &self.items
    }
}

impl<T> fmt::Debug for StaticCluster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCluster")
            .field("center", &self.center)
            .field("size", &self.items.len())
            .finish()
    }
}

/// An item paired with its projected point.
///
/// A `QuadItem` is also a cluster of exactly one item, which is how the
/// distance-based algorithm reports items with no close neighbour.
pub struct QuadItem<T> {
    /// Position in the algorithm's insertion order
    index: usize,
    point: Point,
    position: LatLng,
    item: Arc<T>,
}

impl<T: ClusterItem> QuadItem<T> {
    fn new(index: usize, item: Arc<T>, projection: &SphericalMercatorProjection) -> Self {
        let position = item.position();
        Self {
            index,
            point: projection.to_point(position),
            position,
            item,
        }
    }
}

impl<T> QuadItem<T> {
    pub fn item(&self) -> &Arc<T> {
        &self.item
    }
}

impl<T> QuadTreeItem for QuadItem<T> {
    fn point(&self) -> Point {
        self.point
    }
}

impl<T> PartialEq for QuadItem<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.item, &other.item)
    }
}

impl<T: ClusterItem> Cluster<T> for QuadItem<T> {
    fn position(&self) -> LatLng {
        self.position
    }

    fn items(&self) -> &[Arc<T>] {
        std::slice::from_ref(&self.item)
    }
}

impl<T> fmt::Debug for QuadItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuadItem")
            .field("index", &self.index)
            .field("point", &self.point)
            .field("position", &self.position)
            .finish()
    }
}

/// Identity key of an item: the address of its allocation
pub(crate) fn item_key<T>(item: &Arc<T>) -> usize {
    Arc::as_ptr(item) as usize
}

/// Greedy, non-hierarchical clustering over a quad-tree.
///
/// Items are visited in insertion order. Each unvisited item searches a
/// square around itself whose side is `max_distance_at_zoom` screen pixels at
/// the requested zoom; every item found joins the new cluster unless it is
/// already closer to an earlier cluster's centre. Clusters are centred on
/// the item that seeded them.
///
/// The result depends on insertion order. Individual removal is not
/// supported; use [`Algorithm::clear_items`] and re-add.
pub struct NonHierarchicalDistanceBasedAlgorithm<T> {
    max_distance_at_zoom: u32,
    items: Vec<Arc<QuadItem<T>>>,
    keys: FxHashSet<usize>,
    quad_tree: PointQuadTree<Arc<QuadItem<T>>>,
    projection: SphericalMercatorProjection,
}

/// Where an item ended up during one clustering pass
#[derive(Debug, Clone, Copy)]
enum Assignment {
    Unvisited,
    Single,
    Grouped { group: usize, distance: f64 },
}

/// A cluster in the order it was produced
#[derive(Debug, Clone, Copy)]
enum Emitted {
    /// Index into the item list; the `QuadItem` is its own cluster
    Single(usize),
    /// Index into the groups built during the pass
    Group(usize),
}

impl<T: ClusterItem> NonHierarchicalDistanceBasedAlgorithm<T> {
    pub fn new() -> Self {
        Self {
            max_distance_at_zoom: DEFAULT_MAX_DISTANCE_AT_ZOOM,
            items: Vec::new(),
            keys: FxHashSet::default(),
            quad_tree: PointQuadTree::with_unit_bounds(),
            projection: SphericalMercatorProjection::unit(),
        }
    }

    pub fn with_max_distance(max_distance_at_zoom: u32) -> Self {
        let mut algorithm = Self::new();
        algorithm.max_distance_at_zoom = max_distance_at_zoom;
        algorithm
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Side of the search square, in unit projection space, for a zoom level
    pub fn zoom_specific_span(&self, zoom: f64) -> f64 {
        let discrete_zoom = zoom.floor() as i32;
        self.max_distance_at_zoom as f64 / 2_f64.powi(discrete_zoom) / TILE_SIZE as f64
    }
}

impl<T: ClusterItem + 'static> Algorithm<T> for NonHierarchicalDistanceBasedAlgorithm<T> {
    fn add_item(&mut self, item: Arc<T>) -> bool {
        if !self.keys.insert(item_key(&item)) {
            return false;
        }

        let quad_item = Arc::new(QuadItem::new(self.items.len(), item, &self.projection));
        self.quad_tree.add(Arc::clone(&quad_item));
        self.items.push(quad_item);
        true
    }

    fn remove_item(&mut self, _item: &Arc<T>) -> Result<bool> {
        Err(ClusterError::UnsupportedOperation(
            "NonHierarchicalDistanceBasedAlgorithm does not support removing single items",
        ))
    }

    fn clear_items(&mut self) {
        self.items.clear();
        self.keys.clear();
        self.quad_tree.clear();
    }

    fn clusters(&self, zoom: f64) -> Result<Clusters<T>> {
        let level = discrete_zoom(zoom)?;
        let span = self.zoom_specific_span(zoom);
        let world = self.quad_tree.bounds();

        let mut assignments = vec![Assignment::Unvisited; self.items.len()];
        let mut groups: Vec<StaticCluster<T>> = Vec::new();
        let mut emitted: Vec<Emitted> = Vec::new();

        for candidate in &self.items {
            if !matches!(assignments[candidate.index], Assignment::Unvisited) {
                continue;
            }

            // Points beyond the Mercator latitude limit never entered the tree
            if !world.contains(&candidate.point) {
                assignments[candidate.index] = Assignment::Single;
                emitted.push(Emitted::Single(candidate.index));
                continue;
            }

            let search_bounds = Bounds::from_center_and_span(candidate.point, span);
            let found = self.quad_tree.search(&search_bounds);

            if found.len() == 1 {
                assignments[candidate.index] = Assignment::Single;
                emitted.push(Emitted::Single(candidate.index));
                continue;
            }

            let group = groups.len();
            groups.push(StaticCluster::new(candidate.position));
            emitted.push(Emitted::Group(group));

            for quad_item in found {
                let distance = quad_item.point.distance_squared_to(&candidate.point);
                match assignments[quad_item.index] {
                    Assignment::Grouped {
                        distance: existing, ..
                    } if existing < distance => continue,
                    Assignment::Grouped { group: previous, .. } => {
                        groups[previous].remove(&quad_item.item);
                    }
                    // A lone item's square holds nothing else, so no other
                    // square can hold it.
                    Assignment::Single => continue,
                    Assignment::Unvisited => {}
                }

                groups[group].add(Arc::clone(&quad_item.item));
                assignments[quad_item.index] = Assignment::Grouped { group, distance };
            }
        }

        let mut groups: Vec<Option<StaticCluster<T>>> = groups.into_iter().map(Some).collect();
        let results: Vec<ClusterRef<T>> = emitted
            .into_iter()
            .filter_map(|slot| match slot {
                Emitted::Single(index) => Some(Arc::clone(&self.items[index]) as ClusterRef<T>),
                Emitted::Group(group) => groups[group]
                    .take()
                    .map(|cluster| Arc::new(cluster) as ClusterRef<T>),
            })
            .collect();

        log::debug!(
            "clustered {} items into {} clusters at zoom {}",
            self.items.len(),
            results.len(),
            level
        );
        Ok(Arc::new(results))
    }

    fn items(&self) -> Vec<Arc<T>> {
        self.items
            .iter()
            .map(|quad_item| Arc::clone(quad_item.item()))
            .collect()
    }

    fn set_max_distance_at_zoom(&mut self, max_distance: u32) {
        self.max_distance_at_zoom = max_distance;
    }

    fn max_distance_at_zoom(&self) -> u32 {
        self.max_distance_at_zoom
    }
}

impl<T: ClusterItem> Default for NonHierarchicalDistanceBasedAlgorithm<T> {
    fn default() -> Self {
        Self::new()
    }
}
