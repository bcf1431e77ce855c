//! Shared trait abstractions for clustering
//!
//! These are the seams between the clustering engine and whatever renders
//! its output: items go in through [`ClusterItem`], algorithms implement
//! [`Algorithm`], and results come back as [`Cluster`] trait objects.

use std::sync::Arc;

use crate::{core::geo::LatLng, Result};

/// An entity with a stable geographic position that can be clustered.
///
/// Items are handed to algorithms as `Arc<T>`; two items are the same item
/// only if they are the same allocation.
pub trait ClusterItem: Send + Sync {
    /// Position of the item
    fn position(&self) -> LatLng;

    /// Title shown by an info window, if any
    fn title(&self) -> Option<&str> {
        None
    }

    /// Secondary text shown by an info window, if any
    fn snippet(&self) -> Option<&str> {
        None
    }
}

/// A group of one or more items drawn as a single marker.
pub trait Cluster<T>: Send + Sync {
    /// Position the aggregated marker is drawn at
    fn position(&self) -> LatLng;

    /// Members of the cluster
    fn items(&self) -> &[Arc<T>];

    /// Number of members
    fn size(&self) -> usize {
        self.items().len()
    }
}

/// Shared handle to a cluster
pub type ClusterRef<T> = Arc<dyn Cluster<T>>;

/// The clusters computed for one zoom level.
///
/// Wrapped in an `Arc` so cached results are handed out without copying.
pub type Clusters<T> = Arc<Vec<ClusterRef<T>>>;

/// A clustering algorithm.
///
/// Mutations take `&mut self`; concurrent readers of [`Algorithm::clusters`]
/// must share the algorithm behind a lock that serializes them with writers.
pub trait Algorithm<T: ClusterItem>: Send + Sync {
    /// Add an item. Returns `false` if this exact item was already present.
    fn add_item(&mut self, item: Arc<T>) -> bool;

    /// Add several items. Returns `true` if any item was added.
    fn add_items(&mut self, items: Vec<Arc<T>>) -> bool {
        let mut changed = false;
        for item in items {
            changed |= self.add_item(item);
        }
        changed
    }

    /// Remove an item. Returns whether it was present.
    fn remove_item(&mut self, item: &Arc<T>) -> Result<bool>;

    /// Remove every item
    fn clear_items(&mut self);

    /// Compute the clusters for a zoom level
    fn clusters(&self, zoom: f64) -> Result<Clusters<T>>;

    /// All items, unclustered, in insertion order
    fn items(&self) -> Vec<Arc<T>>;

    /// Set the on-screen distance (pixels) that drives clustering
    fn set_max_distance_at_zoom(&mut self, max_distance: u32);

    /// The on-screen distance (pixels) that drives clustering
    fn max_distance_at_zoom(&self) -> u32;
}

/// Mutable, boxed algorithms delegate to their contents so a
/// `Box<dyn Algorithm<T>>` can be wrapped by decorators.
impl<T: ClusterItem, A: Algorithm<T> + ?Sized> Algorithm<T> for Box<A> {
    fn add_item(&mut self, item: Arc<T>) -> bool {
        (**self).add_item(item)
    }

    fn add_items(&mut self, items: Vec<Arc<T>>) -> bool {
        (**self).add_items(items)
    }

    fn remove_item(&mut self, item: &Arc<T>) -> Result<bool> {
        (**self).remove_item(item)
    }

    fn clear_items(&mut self) {
        (**self).clear_items()
    }

    fn clusters(&self, zoom: f64) -> Result<Clusters<T>> {
        (**self).clusters(zoom)
    }

    fn items(&self) -> Vec<Arc<T>> {
        (**self).items()
    }

    fn set_max_distance_at_zoom(&mut self, max_distance: u32) {
        (**self).set_max_distance_at_zoom(max_distance)
    }

    fn max_distance_at_zoom(&self) -> u32 {
        (**self).max_distance_at_zoom()
    }
}
