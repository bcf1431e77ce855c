//! Prelude module for common mapcluster types and traits
//!
//! This module re-exports the most commonly used types and traits
//! for easy importing with `use mapcluster::prelude::*;`

pub use crate::core::{
    bounds::Bounds,
    builder::AlgorithmBuilder,
    config::{AlgorithmKind, ClusterConfig, ClusterProfile, PrecacheConfig},
    geo::{LatLng, Point},
    projection::SphericalMercatorProjection,
};

pub use crate::spatial::{
    clustering::{NonHierarchicalDistanceBasedAlgorithm, StaticCluster},
    grid::GridBasedAlgorithm,
};

pub use crate::background::precache::PreCachingAlgorithmDecorator;

pub use crate::traits::{Algorithm, Cluster, ClusterItem, ClusterRef, Clusters};

pub use crate::{ClusterError, Result};

pub use std::sync::Arc;
