use std::sync::Arc;

use fxhash::{FxHashMap, FxHashSet};

use crate::{
    core::{
        constants::{DEFAULT_MAX_DISTANCE_AT_ZOOM, TILE_SIZE},
        geo::Point,
        projection::{discrete_zoom, SphericalMercatorProjection},
    },
    spatial::clustering::{item_key, StaticCluster},
    traits::{Algorithm, ClusterItem, ClusterRef, Clusters},
    Result,
};

/// Grid-based clustering.
///
/// The world is cut into square cells of `grid_size` screen pixels at the
/// requested zoom; every item joins the cluster of its cell, centred on the
/// cell. Cheaper than the distance-based algorithm, and supports removal.
pub struct GridBasedAlgorithm<T> {
    grid_size: u32,
    items: Vec<Arc<T>>,
    keys: FxHashSet<usize>,
}

impl<T: ClusterItem> GridBasedAlgorithm<T> {
    pub fn new() -> Self {
        Self::with_grid_size(DEFAULT_MAX_DISTANCE_AT_ZOOM)
    }

    pub fn with_grid_size(grid_size: u32) -> Self {
        Self {
            grid_size,
            items: Vec::new(),
            keys: FxHashSet::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Cells along one side of the world at a zoom level
    pub fn cells_per_side(&self, zoom: f64) -> f64 {
        let discrete_zoom = zoom.floor() as i32;
        (TILE_SIZE as f64 * 2_f64.powi(discrete_zoom) / self.grid_size.max(1) as f64).ceil()
    }
}

impl<T: ClusterItem + 'static> Algorithm<T> for GridBasedAlgorithm<T> {
    fn add_item(&mut self, item: Arc<T>) -> bool {
        if !self.keys.insert(item_key(&item)) {
            return false;
        }
        self.items.push(item);
        true
    }

    fn remove_item(&mut self, item: &Arc<T>) -> Result<bool> {
        if !self.keys.remove(&item_key(item)) {
            return Ok(false);
        }
        self.items.retain(|existing| !Arc::ptr_eq(existing, item));
        Ok(true)
    }

    fn clear_items(&mut self) {
        self.items.clear();
        self.keys.clear();
    }

    fn clusters(&self, zoom: f64) -> Result<Clusters<T>> {
        let level = discrete_zoom(zoom)?;
        let num_cells = self.cells_per_side(zoom);
        let projection = SphericalMercatorProjection::new(num_cells);

        // Group items by grid cell, keeping first-occupancy order
        let estimated_grid_cells = (self.items.len() / 4).max(16);
        let mut cells: FxHashMap<(i64, i64), usize> = FxHashMap::default();
        cells.reserve(estimated_grid_cells);
        let mut clusters: Vec<StaticCluster<T>> = Vec::new();

        for item in &self.items {
            let point = projection.to_point(item.position());
            let cell = point.floor();
            let key = (cell.x as i64, cell.y as i64);

            let index = *cells.entry(key).or_insert_with(|| {
                let center = projection.to_lat_lng(Point::new(cell.x + 0.5, cell.y + 0.5));
                clusters.push(StaticCluster::new(center));
                clusters.len() - 1
            });
            clusters[index].add(Arc::clone(item));
        }

        log::debug!(
            "grid clustered {} items into {} cells at zoom {}",
            self.items.len(),
            clusters.len(),
            level
        );
        Ok(Arc::new(
            clusters
                .into_iter()
                .map(|cluster| Arc::new(cluster) as ClusterRef<T>)
                .collect(),
        ))
    }

    fn items(&self) -> Vec<Arc<T>> {
        self.items.clone()
    }

    fn set_max_distance_at_zoom(&mut self, max_distance: u32) {
        self.grid_size = max_distance;
    }

    fn max_distance_at_zoom(&self) -> u32 {
        self.grid_size
    }
}

impl<T: ClusterItem> Default for GridBasedAlgorithm<T> {
    fn default() -> Self {
        Self::new()
    }
}
