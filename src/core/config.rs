//! Configuration for the clustering engine
//!
//! Configuration is an explicit value handed to [`AlgorithmBuilder`]
//! at startup. Presets are available through [`ClusterProfile`], and every
//! struct can be loaded from JSON.
//!
//! [`AlgorithmBuilder`]: crate::core::builder::AlgorithmBuilder

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    core::constants::{
        DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_DISTANCE_AT_ZOOM, DEFAULT_PRECACHE_MAX_DELAY_MS,
        DEFAULT_PRECACHE_MIN_DELAY_MS, DEFAULT_PRECACHE_QUEUE_SIZE, DEFAULT_PRECACHE_WORKERS,
    },
    ClusterError, Result,
};

/// Which clustering algorithm to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Greedy quad-tree clustering around seed items
    #[default]
    DistanceBased,
    /// Fixed screen-space grid cells
    GridBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecacheConfig {
    /// Zoom levels kept in the LRU cache
    pub cache_capacity: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub worker_threads: usize,
    pub max_queue_size: usize,
}

impl PrecacheConfig {
    /// Precaching without the debounce delay
    pub fn immediate() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn delay_range(&self) -> RangeInclusive<u64> {
        self.min_delay_ms..=self.max_delay_ms
    }

    /// Picks a debounce delay uniformly from the configured range
    pub fn random_delay(&self) -> Duration {
        use rand::Rng;

        if self.min_delay_ms >= self.max_delay_ms {
            return Duration::from_millis(self.min_delay_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.delay_range()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(ClusterError::InvalidConfig(
                "precache.cache_capacity must be at least 1".into(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(ClusterError::InvalidConfig(
                "precache.worker_threads must be at least 1".into(),
            ));
        }
        if self.max_queue_size == 0 {
            return Err(ClusterError::InvalidConfig(
                "precache.max_queue_size must be at least 1".into(),
            ));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ClusterError::InvalidConfig(format!(
                "precache delay range is empty: {}..={} ms",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

impl Default for PrecacheConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            min_delay_ms: DEFAULT_PRECACHE_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_PRECACHE_MAX_DELAY_MS,
            worker_threads: DEFAULT_PRECACHE_WORKERS,
            max_queue_size: DEFAULT_PRECACHE_QUEUE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub algorithm: AlgorithmKind,
    /// On-screen merge radius in pixels (grid cell size for the grid algorithm)
    pub max_distance_at_zoom: u32,
    /// Wrap the algorithm in the pre-caching decorator when set
    pub precache: Option<PrecacheConfig>,
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_distance_at_zoom == 0 {
            return Err(ClusterError::InvalidConfig(
                "max_distance_at_zoom must be at least 1 pixel".into(),
            ));
        }
        if let Some(precache) = &self.precache {
            precache.validate()?;
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration. Missing fields take their
    /// default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterProfile::default().resolve()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ClusterProfile {
    /// Distance-based clustering with the default pre-cache
    #[default]
    Balanced,
    /// Bigger cache, more workers and a short debounce for fast zooming
    Responsive,
    /// Distance-based clustering computed on every call
    Uncached,
    /// Grid clustering with the default pre-cache
    Coarse,
    Custom(ClusterConfig),
}

impl ClusterProfile {
    pub fn resolve(&self) -> ClusterConfig {
        match self {
            Self::Balanced => ClusterConfig {
                algorithm: AlgorithmKind::DistanceBased,
                max_distance_at_zoom: DEFAULT_MAX_DISTANCE_AT_ZOOM,
                precache: Some(PrecacheConfig::default()),
            },
            Self::Responsive => ClusterConfig {
                algorithm: AlgorithmKind::DistanceBased,
                max_distance_at_zoom: DEFAULT_MAX_DISTANCE_AT_ZOOM,
                precache: Some(PrecacheConfig {
                    cache_capacity: 9,
                    min_delay_ms: 100,
                    max_delay_ms: 300,
                    worker_threads: 4,
                    max_queue_size: 32,
                }),
            },
            Self::Uncached => ClusterConfig {
                algorithm: AlgorithmKind::DistanceBased,
                max_distance_at_zoom: DEFAULT_MAX_DISTANCE_AT_ZOOM,
                precache: None,
            },
            Self::Coarse => ClusterConfig {
                algorithm: AlgorithmKind::GridBased,
                max_distance_at_zoom: DEFAULT_MAX_DISTANCE_AT_ZOOM,
                precache: Some(PrecacheConfig::default()),
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_presets() {
        let balanced = ClusterProfile::Balanced.resolve();
        assert_eq!(balanced, ClusterConfig::default());
        assert_eq!(balanced.max_distance_at_zoom, 100);
        assert_eq!(balanced.precache.as_ref().unwrap().cache_capacity, 5);

        assert!(ClusterProfile::Uncached.resolve().precache.is_none());
        assert_eq!(
            ClusterProfile::Coarse.resolve().algorithm,
            AlgorithmKind::GridBased
        );

        let responsive = ClusterProfile::Responsive.resolve();
        assert!(responsive.validate().is_ok());
        assert!(
            responsive.precache.unwrap().max_delay_ms
                < PrecacheConfig::default().max_delay_ms
        );
    }

    #[test]
    fn test_default_delay_range() {
        let config = PrecacheConfig::default();
        assert_eq!(config.delay_range(), 500..=1000);
        for _ in 0..50 {
            let delay = config.random_delay();
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1000));
        }
        assert_eq!(PrecacheConfig::immediate().random_delay(), Duration::ZERO);
    }

    #[test]
    fn test_json_round_trip() {
        let config = ClusterProfile::Responsive.resolve();
        let json = config.to_json().unwrap();
        assert_eq!(ClusterConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_json_defaults_for_missing_fields() {
        let config = ClusterConfig::from_json(r#"{ "algorithm": "grid_based" }"#).unwrap();
        assert_eq!(config.algorithm, AlgorithmKind::GridBased);
        assert_eq!(config.max_distance_at_zoom, DEFAULT_MAX_DISTANCE_AT_ZOOM);

        let config =
            ClusterConfig::from_json(r#"{ "precache": { "worker_threads": 1 } }"#).unwrap();
        let precache = config.precache.unwrap();
        assert_eq!(precache.worker_threads, 1);
        assert_eq!(precache.cache_capacity, DEFAULT_CACHE_CAPACITY);

        let config = ClusterConfig::from_json(r#"{ "precache": null }"#).unwrap();
        assert!(config.precache.is_none());
    }

    #[test]
    fn test_invalid_configs() {
        let zero_distance = ClusterConfig {
            max_distance_at_zoom: 0,
            ..ClusterConfig::default()
        };
        assert!(matches!(
            zero_distance.validate(),
            Err(ClusterError::InvalidConfig(_))
        ));

        let empty_range = PrecacheConfig {
            min_delay_ms: 10,
            max_delay_ms: 5,
            ..PrecacheConfig::default()
        };
        assert!(empty_range.validate().is_err());

        let no_workers = PrecacheConfig {
            worker_threads: 0,
            ..PrecacheConfig::default()
        };
        assert!(no_workers.validate().is_err());

        assert!(matches!(
            ClusterConfig::from_json("{ not json"),
            Err(ClusterError::Serialization(_))
        ));
        assert!(matches!(
            ClusterConfig::from_json(r#"{ "max_distance_at_zoom": 0 }"#),
            Err(ClusterError::InvalidConfig(_))
        ));
    }
}
