//! Per-zoom caching of cluster results
//!
//! [`PreCachingAlgorithmDecorator`] wraps any [`Algorithm`] and remembers
//! the clusters of the last few zoom levels. After each request it asks the
//! background pool to compute the zoom levels just above and below, so that
//! zooming in or out one step is served from the cache.

use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use fxhash::FxHashSet;
use lru::LruCache;

use crate::{
    background::tasks::{
        BackgroundTask, BackgroundTaskManager, CancellationToken, TaskContext, TaskId,
        TaskManagerConfig,
    },
    core::{config::PrecacheConfig, projection::discrete_zoom},
    traits::{Algorithm, ClusterItem, Clusters},
    ClusterError, Result,
};

/// State shared between the decorator and its background tasks.
///
/// Lock order: `algorithm`, then `cache`, then `epoch`.
struct Shared<T, A> {
    algorithm: RwLock<A>,
    cache: RwLock<LruCache<i32, Clusters<T>>>,
    /// Bumped on every mutation; results computed for an older generation
    /// are never stored
    generation: AtomicU64,
    /// Cancelled and replaced on every mutation, waking tasks that are still
    /// waiting out their delay
    epoch: Mutex<CancellationToken>,
    /// `(zoom, generation)` pairs queued or running in the background
    pending: Mutex<FxHashSet<(i32, u64)>>,
}

impl<T: ClusterItem + 'static, A: Algorithm<T>> Shared<T, A> {
    fn read_algorithm(&self) -> Result<RwLockReadGuard<'_, A>> {
        self.algorithm
            .read()
            .map_err(|_| ClusterError::LockPoisoned("clustering algorithm"))
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, LruCache<i32, Clusters<T>>> {
        // The cache holds only complete entries, so a poisoned lock is safe to reuse
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached(&self, zoom: i32) -> Option<Clusters<T>> {
        let hit = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .peek(&zoom)
            .cloned();

        if hit.is_some() {
            // Refresh recency only if nobody else holds the lock
            if let Ok(mut cache) = self.cache.try_write() {
                cache.get(&zoom);
            }
        }
        hit
    }

    fn is_cached(&self, zoom: i32) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&zoom)
    }

    /// Read-through lookup used by the calling thread
    fn clusters(&self, zoom: i32) -> Result<Clusters<T>> {
        if let Some(clusters) = self.cached(zoom) {
            return Ok(clusters);
        }

        let algorithm = self.read_algorithm()?;
        let mut cache = self.write_cache();
        if let Some(clusters) = cache.get(&zoom) {
            return Ok(Arc::clone(clusters));
        }

        let clusters = algorithm.clusters(f64::from(zoom))?;
        cache.put(zoom, Arc::clone(&clusters));
        Ok(clusters)
    }

    /// Background fill. Does nothing if the items changed since the request
    /// was made or the level is already cached.
    fn fill(&self, zoom: i32, generation: u64) -> Result<bool> {
        let algorithm = self.read_algorithm()?;
        if self.generation.load(Ordering::SeqCst) != generation || self.is_cached(zoom) {
            return Ok(false);
        }

        let clusters = algorithm.clusters(f64::from(zoom))?;
        let mut cache = self.write_cache();
        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(false);
        }
        cache.put(zoom, clusters);
        Ok(true)
    }

    /// Applies a mutation to the wrapped algorithm and drops every cached
    /// level. Clustering is not local, so partial invalidation is unsound.
    fn mutate<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        let mut algorithm = self.algorithm.write().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut *algorithm);

        let mut cache = self.write_cache();
        cache.clear();

        let mut epoch = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        epoch.cancel();
        *epoch = CancellationToken::new();
        result
    }

    /// The current generation and the token that is cancelled when it ends
    fn current_epoch(&self) -> (u64, CancellationToken) {
        let epoch = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        (self.generation.load(Ordering::SeqCst), epoch.clone())
    }
}

/// A speculative computation of one zoom level
struct PrecacheTask<T, A> {
    shared: Arc<Shared<T, A>>,
    zoom: i32,
    generation: u64,
    token: CancellationToken,
    delay: Duration,
}

impl<T, A> BackgroundTask for PrecacheTask<T, A>
where
    T: ClusterItem + 'static,
    A: Algorithm<T> + 'static,
{
    fn task_id(&self) -> TaskId {
        format!("precache-zoom-{}-gen-{}", self.zoom, self.generation)
    }

    fn execute(self: Box<Self>, ctx: &TaskContext) -> Result<()> {
        let _pending = PendingGuard {
            pending: &self.shared.pending,
            key: (self.zoom, self.generation),
        };

        if !ctx.sleep_unless_cancelled(self.delay, &self.token) {
            return Ok(());
        }
        if self.shared.fill(self.zoom, self.generation)? {
            log::debug!("precached clusters for zoom {}", self.zoom);
        }
        Ok(())
    }
}

/// Clears a pending entry however the task ends
struct PendingGuard<'a> {
    pending: &'a Mutex<FxHashSet<(i32, u64)>>,
    key: (i32, u64),
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Caches clusters per discrete zoom level and pre-computes the adjacent
/// levels in the background.
///
/// Any mutation evicts the whole cache and cancels queued pre-computations.
/// Errors from the wrapped algorithm reach the caller of
/// [`Algorithm::clusters`]; errors in background computations are logged and
/// otherwise ignored.
pub struct PreCachingAlgorithmDecorator<T, A> {
    shared: Arc<Shared<T, A>>,
    tasks: BackgroundTaskManager,
    config: PrecacheConfig,
    _items: PhantomData<fn() -> T>,
}

impl<T, A> PreCachingAlgorithmDecorator<T, A>
where
    T: ClusterItem + 'static,
    A: Algorithm<T> + 'static,
{
    /// Wraps `algorithm` with the default pre-cache settings
    pub fn new(algorithm: A) -> Result<Self> {
        Self::with_config(algorithm, PrecacheConfig::default())
    }

    pub fn with_config(algorithm: A, config: PrecacheConfig) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| ClusterError::InvalidConfig("cache capacity must be non-zero".into()))?;

        let tasks = BackgroundTaskManager::new(TaskManagerConfig {
            worker_threads: config.worker_threads,
            max_queue_size: config.max_queue_size,
            thread_name: "mapcluster-precache".to_string(),
        })?;

        Ok(Self {
            shared: Arc::new(Shared {
                algorithm: RwLock::new(algorithm),
                cache: RwLock::new(LruCache::new(capacity)),
                generation: AtomicU64::new(0),
                epoch: Mutex::new(CancellationToken::new()),
                pending: Mutex::new(FxHashSet::default()),
            }),
            tasks,
            config,
            _items: PhantomData,
        })
    }

    pub fn config(&self) -> &PrecacheConfig {
        &self.config
    }

    /// Whether the level containing `zoom` is currently cached
    pub fn is_cached(&self, zoom: f64) -> bool {
        discrete_zoom(zoom).is_ok_and(|level| self.shared.is_cached(level))
    }

    /// Cached zoom levels, most recently used first
    pub fn cached_zoom_levels(&self) -> Vec<i32> {
        self.shared
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(zoom, _)| *zoom)
            .collect()
    }

    /// Pre-computations queued or running
    pub fn pending_precaches(&self) -> usize {
        self.shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stops the background workers. Later requests are still served, just
    /// without pre-computation.
    pub fn shutdown(&mut self) {
        self.tasks.shutdown();
    }

    fn schedule_precache(&self, zoom: i32) {
        if self.tasks.is_shutting_down() || self.shared.is_cached(zoom) {
            return;
        }

        let (generation, token) = self.shared.current_epoch();
        let key = (zoom, generation);
        {
            let mut pending = self
                .shared
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !pending.insert(key) {
                return;
            }
        }

        let task = PrecacheTask {
            shared: Arc::clone(&self.shared),
            zoom,
            generation,
            token,
            delay: self.config.random_delay(),
        };
        if let Err(e) = self.tasks.submit_task(Box::new(task)) {
            log::debug!("skipping precache of zoom {}: {}", zoom, e);
            self.shared
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
    }
}

impl<T, A> Algorithm<T> for PreCachingAlgorithmDecorator<T, A>
where
    T: ClusterItem + 'static,
    A: Algorithm<T> + 'static,
{
    fn add_item(&mut self, item: Arc<T>) -> bool {
        self.shared.mutate(|algorithm| algorithm.add_item(item))
    }

    fn add_items(&mut self, items: Vec<Arc<T>>) -> bool {
        self.shared.mutate(|algorithm| algorithm.add_items(items))
    }

    fn remove_item(&mut self, item: &Arc<T>) -> Result<bool> {
        self.shared.mutate(|algorithm| algorithm.remove_item(item))
    }

    fn clear_items(&mut self) {
        self.shared.mutate(|algorithm| algorithm.clear_items())
    }

    fn clusters(&self, zoom: f64) -> Result<Clusters<T>> {
        let level = discrete_zoom(zoom)?;
        let results = self.shared.clusters(level)?;

        for neighbour in [level.checked_add(1), level.checked_sub(1)]
            .into_iter()
            .flatten()
        {
            self.schedule_precache(neighbour);
        }
        Ok(results)
    }

    fn items(&self) -> Vec<Arc<T>> {
        self.shared
            .algorithm
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items()
    }

    fn set_max_distance_at_zoom(&mut self, max_distance: u32) {
        self.shared
            .mutate(|algorithm| algorithm.set_max_distance_at_zoom(max_distance))
    }

    fn max_distance_at_zoom(&self) -> u32 {
        self.shared
            .algorithm
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .max_distance_at_zoom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LatLng;
    use crate::spatial::clustering::NonHierarchicalDistanceBasedAlgorithm;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    struct Marker(LatLng);

    impl ClusterItem for Marker {
        fn position(&self) -> LatLng {
            self.0
        }
    }

    /// Counts calls to `clusters` on the wrapped algorithm
    struct Counting {
        inner: NonHierarchicalDistanceBasedAlgorithm<Marker>,
        calls: Arc<AtomicUsize>,
    }

    impl Algorithm<Marker> for Counting {
        fn add_item(&mut self, item: Arc<Marker>) -> bool {
            self.inner.add_item(item)
        }

        fn remove_item(&mut self, item: &Arc<Marker>) -> Result<bool> {
            self.inner.remove_item(item)
        }

        fn clear_items(&mut self) {
            self.inner.clear_items()
        }

        fn clusters(&self, zoom: f64) -> Result<Clusters<Marker>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.clusters(zoom)
        }

        fn items(&self) -> Vec<Arc<Marker>> {
            self.inner.items()
        }

        fn set_max_distance_at_zoom(&mut self, max_distance: u32) {
            self.inner.set_max_distance_at_zoom(max_distance)
        }

        fn max_distance_at_zoom(&self) -> u32 {
            self.inner.max_distance_at_zoom()
        }
    }

    fn counting() -> (Counting, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let algorithm = Counting {
            inner: NonHierarchicalDistanceBasedAlgorithm::new(),
            calls: Arc::clone(&calls),
        };
        (algorithm, calls)
    }

    /// A pool whose background work never gets to run within a test
    fn slow_precache() -> PrecacheConfig {
        PrecacheConfig {
            min_delay_ms: 60_000,
            max_delay_ms: 60_000,
            ..PrecacheConfig::default()
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_hit_returns_same_instance() {
        let (algorithm, calls) = counting();
        let mut decorator =
            PreCachingAlgorithmDecorator::with_config(algorithm, slow_precache()).unwrap();
        decorator.add_item(Arc::new(Marker(LatLng::new(1.0, 1.0))));

        let first = decorator.clusters(10.2).unwrap();
        let second = decorator.clusters(10.9).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(decorator.is_cached(10.0));
    }

    #[test]
    fn test_duplicate_precache_requests_are_collapsed() {
        let (algorithm, _calls) = counting();
        let decorator =
            PreCachingAlgorithmDecorator::with_config(algorithm, slow_precache()).unwrap();

        decorator.clusters(10.0).unwrap();
        decorator.clusters(10.0).unwrap();
        // zoom 9 and 11, queued once each
        assert_eq!(decorator.pending_precaches(), 2);
    }

    #[test]
    fn test_mutation_wakes_sleeping_precache() {
        let (algorithm, calls) = counting();
        let mut decorator =
            PreCachingAlgorithmDecorator::with_config(algorithm, slow_precache()).unwrap();

        decorator.clusters(10.0).unwrap();
        assert_eq!(decorator.pending_precaches(), 2);

        let started = Instant::now();
        decorator.add_item(Arc::new(Marker(LatLng::new(1.0, 1.0))));
        assert!(wait_for(|| decorator.pending_precaches() == 0));
        assert!(started.elapsed() < Duration::from_secs(5));

        assert!(decorator.cached_zoom_levels().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fresh_precache_does_not_wait_behind_stale_ones() {
        let (algorithm, _calls) = counting();
        let mut decorator = PreCachingAlgorithmDecorator::with_config(
            algorithm,
            PrecacheConfig {
                min_delay_ms: 1_000,
                max_delay_ms: 1_000,
                worker_threads: 2,
                ..PrecacheConfig::default()
            },
        )
        .unwrap();

        decorator.clusters(10.0).unwrap();
        decorator.add_item(Arc::new(Marker(LatLng::new(1.0, 1.0))));

        let started = Instant::now();
        decorator.clusters(10.0).unwrap();
        assert!(wait_for(|| decorator.is_cached(9.0) && decorator.is_cached(11.0)));
        // One debounce delay, not two
        assert!(started.elapsed() < Duration::from_millis(1_800));
    }

    #[test]
    fn test_non_finite_zoom_is_rejected() {
        let (algorithm, calls) = counting();
        let decorator =
            PreCachingAlgorithmDecorator::with_config(algorithm, slow_precache()).unwrap();

        for zoom in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(
                decorator.clusters(zoom),
                Err(ClusterError::InvalidZoom(_))
            ));
            assert!(!decorator.is_cached(zoom));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(decorator.pending_precaches(), 0);
    }

    #[test]
    fn test_extreme_zoom_skips_missing_neighbour() {
        let (algorithm, _calls) = counting();
        let decorator =
            PreCachingAlgorithmDecorator::with_config(algorithm, slow_precache()).unwrap();

        decorator.clusters(1e12).unwrap();
        assert_eq!(decorator.cached_zoom_levels(), vec![i32::MAX]);
        // Only i32::MAX - 1 can be scheduled
        assert_eq!(decorator.pending_precaches(), 1);

        decorator.clusters(-1e12).unwrap();
        assert!(decorator.is_cached(-1e12));
        assert_eq!(decorator.pending_precaches(), 2);
    }

    #[test]
    fn test_capacity_bounds_cache() {
        let (algorithm, _calls) = counting();
        let decorator = PreCachingAlgorithmDecorator::with_config(
            algorithm,
            PrecacheConfig {
                cache_capacity: 2,
                ..slow_precache()
            },
        )
        .unwrap();

        for zoom in [3.0, 4.0, 5.0] {
            decorator.clusters(zoom).unwrap();
        }
        assert_eq!(decorator.cached_zoom_levels(), vec![5, 4]);
    }

    #[test]
    fn test_unsupported_remove_propagates_and_evicts() {
        let (algorithm, _calls) = counting();
        let mut decorator =
            PreCachingAlgorithmDecorator::with_config(algorithm, slow_precache()).unwrap();
        let item = Arc::new(Marker(LatLng::new(1.0, 1.0)));
        decorator.add_item(Arc::clone(&item));
        decorator.clusters(7.0).unwrap();

        assert!(matches!(
            decorator.remove_item(&item),
            Err(ClusterError::UnsupportedOperation(_))
        ));
        assert!(!decorator.is_cached(7.0));
        assert_eq!(decorator.items().len(), 1);
    }

    #[test]
    fn test_max_distance_change_evicts() {
        let (algorithm, calls) = counting();
        let mut decorator =
            PreCachingAlgorithmDecorator::with_config(algorithm, slow_precache()).unwrap();
        decorator.clusters(4.0).unwrap();

        decorator.set_max_distance_at_zoom(50);
        assert_eq!(decorator.max_distance_at_zoom(), 50);
        assert!(!decorator.is_cached(4.0));
        decorator.clusters(4.0).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shutdown_still_serves() {
        let (algorithm, _calls) = counting();
        let mut decorator =
            PreCachingAlgorithmDecorator::with_config(algorithm, slow_precache()).unwrap();
        decorator.shutdown();

        decorator.clusters(6.0).unwrap();
        assert!(decorator.is_cached(6.0));
        assert_eq!(decorator.pending_precaches(), 0);
    }
}
