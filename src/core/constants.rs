//! Engine-wide constants.
//! Keeping them in a single place makes it easier to tweak clustering magic numbers.

/// Square tile size in pixels; converts an on-screen distance into world units.
pub const TILE_SIZE: u32 = 256;

/// Items a quad-tree leaf holds before it splits.
pub const MAX_ELEMENTS: usize = 50;

/// Deepest level a quad-tree node may reach. Leaves at this depth never split.
pub const MAX_DEPTH: usize = 40;

/// On-screen radius (pixels) within which items merge, and the grid cell size
/// for the grid-based algorithm.
pub const DEFAULT_MAX_DISTANCE_AT_ZOOM: u32 = 100;

/// Zoom levels kept by the pre-caching decorator.
pub const DEFAULT_CACHE_CAPACITY: usize = 5;

/// Lower bound of the random debounce before a speculative computation.
pub const DEFAULT_PRECACHE_MIN_DELAY_MS: u64 = 500;

/// Upper bound of the random debounce before a speculative computation.
pub const DEFAULT_PRECACHE_MAX_DELAY_MS: u64 = 1000;

/// Background threads used for speculative computations.
pub const DEFAULT_PRECACHE_WORKERS: usize = 2;

/// Speculative requests queued before new ones are dropped.
pub const DEFAULT_PRECACHE_QUEUE_SIZE: usize = 16;

/// Mean Earth radius in metres used by the spherical helpers.
pub const EARTH_RADIUS: f64 = 6_371_009.0;
