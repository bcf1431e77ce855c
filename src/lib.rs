//! # mapcluster
//!
//! A vendor-agnostic marker clustering engine for map front-ends.
//!
//! Items exposing a geographic position are added to an [`Algorithm`]; for
//! any camera zoom the algorithm returns the clusters to draw. The engine
//! ships a quad-tree backed distance-based algorithm, a grid-based one, and
//! a decorator that caches results per zoom level and pre-computes the
//! neighbouring levels in the background.
//!
//! ```rust
//! use std::sync::Arc;
//! use mapcluster::prelude::*;
//!
//! struct Poi(LatLng);
//!
//! impl ClusterItem for Poi {
//!     fn position(&self) -> LatLng {
//!         self.0
//!     }
//! }
//!
//! let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
//! algorithm.add_item(Arc::new(Poi(LatLng::new(31.2304, 121.4737))));
//! algorithm.add_item(Arc::new(Poi(LatLng::new(31.2305, 121.4738))));
//!
//! let clusters = algorithm.clusters(12.0)?;
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters[0].size(), 2);
//! # Ok::<(), mapcluster::ClusterError>(())
//! ```

pub mod background;
pub mod core;
pub mod prelude;
pub mod spatial;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    bounds::Bounds,
    builder::AlgorithmBuilder,
    config::{AlgorithmKind, ClusterConfig, ClusterProfile, PrecacheConfig},
    geo::{LatLng, Point},
    projection::SphericalMercatorProjection,
};

pub use background::precache::PreCachingAlgorithmDecorator;

pub use spatial::{
    clustering::{NonHierarchicalDistanceBasedAlgorithm, QuadItem, StaticCluster},
    grid::GridBasedAlgorithm,
    quadtree::{PointQuadTree, QuadTreeItem},
};

pub use traits::{Algorithm, Cluster, ClusterItem, ClusterRef, Clusters};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid zoom level: {0}")]
    InvalidZoom(f64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("Index {index} out of bounds for path of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

/// Error type alias for convenience
pub type Error = ClusterError;
