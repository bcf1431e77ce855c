//! Algorithm builder for fluent configuration
//!
//! [`AlgorithmBuilder`] turns a [`ClusterConfig`] (or a [`ClusterProfile`])
//! into a ready-to-use clustering algorithm, wrapped in the pre-caching
//! decorator when the configuration asks for it.

use crate::{
    background::precache::PreCachingAlgorithmDecorator,
    core::config::{AlgorithmKind, ClusterConfig, ClusterProfile, PrecacheConfig},
    spatial::{clustering::NonHierarchicalDistanceBasedAlgorithm, grid::GridBasedAlgorithm},
    traits::{Algorithm, ClusterItem},
    Result,
};

/// Builder for creating and configuring clustering algorithms
#[derive(Debug, Clone, Default)]
pub struct AlgorithmBuilder {
    config: ClusterConfig,
}

impl AlgorithmBuilder {
    /// Create a new builder with the balanced profile
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Replace the configuration with a preset
    pub fn with_profile(mut self, profile: ClusterProfile) -> Self {
        self.config = profile.resolve();
        self
    }

    pub fn with_algorithm(mut self, algorithm: AlgorithmKind) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    /// Set the merge radius in screen pixels
    pub fn with_max_distance_at_zoom(mut self, max_distance: u32) -> Self {
        self.config.max_distance_at_zoom = max_distance;
        self
    }

    /// Enable per-zoom caching with background pre-computation
    pub fn with_precache(mut self, precache: PrecacheConfig) -> Self {
        self.config.precache = Some(precache);
        self
    }

    /// Compute clusters on every request
    pub fn without_precache(mut self) -> Self {
        self.config.precache = None;
        self
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Build the algorithm with the configured options
    pub fn build<T: ClusterItem + 'static>(&self) -> Result<Box<dyn Algorithm<T>>> {
        self.config.validate()?;

        let max_distance = self.config.max_distance_at_zoom;
        let algorithm: Box<dyn Algorithm<T>> = match self.config.algorithm {
            AlgorithmKind::DistanceBased => Box::new(
                NonHierarchicalDistanceBasedAlgorithm::with_max_distance(max_distance),
            ),
            AlgorithmKind::GridBased => Box::new(GridBasedAlgorithm::with_grid_size(max_distance)),
        };

        match &self.config.precache {
            Some(precache) => {
                log::debug!(
                    "building {:?} algorithm with a {}-level cache",
                    self.config.algorithm,
                    precache.cache_capacity
                );
                Ok(Box::new(PreCachingAlgorithmDecorator::with_config(
                    algorithm,
                    precache.clone(),
                )?))
            }
            None => Ok(algorithm),
        }
    }
}
