//! LRU cache of prepared regridders.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use cube_common::Cube;

use crate::config::ProcessorConfig;
use crate::error::Result;
use crate::regrid::{build_regridder_with, GridSignature, RegridOptions, Regridder};
use crate::types::{CacheStats, ExtrapolationMode, RegridMethod};

/// Cache key: both grids plus every option that changes the weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegridKey {
    pub source: GridSignature,
    pub target: GridSignature,
    pub method: RegridMethod,
    pub mdtol_bits: u64,
    pub extrapolation: ExtrapolationMode,
}

impl RegridKey {
    pub fn new(source: &Cube, target: &Cube, options: &RegridOptions) -> Result<Self> {
        Ok(Self {
            source: GridSignature::of(source)?,
            target: GridSignature::of(target)?,
            method: options.method,
            mdtol_bits: options.mdtol.to_bits(),
            extrapolation: options.extrapolation,
        })
    }
}

/// LRU cache of regridders keyed by source grid, target grid and options.
///
/// Regridders are handed out as `Arc`s so a cached operator can be applied
/// from several threads while the cache keeps evicting.
pub struct RegridderCache {
    cache: LruCache<RegridKey, Arc<Regridder>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl RegridderCache {
    /// Create a cache holding at most `capacity` regridders (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self::new(config.regridder_cache_size)
    }

    /// Return the cached regridder for this grid pair, building it on a miss.
    pub fn get_or_build(
        &mut self,
        source: &Cube,
        target: &Cube,
        options: &RegridOptions,
    ) -> Result<Arc<Regridder>> {
        let key = RegridKey::new(source, target, options)?;
        if let Some(regridder) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(method = %options.method, source = ?key.source.shape, "Regridder cache hit");
            return Ok(Arc::clone(regridder));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(method = %options.method, source = ?key.source.shape, "Regridder cache miss");
        let regridder = Arc::new(build_regridder_with(source, target, options)?);
        if let Some((evicted, _)) = self.cache.push(key, Arc::clone(&regridder)) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(regridder)
    }

    /// Regrid `cube` onto `target`, reusing a cached regridder when possible.
    pub fn regrid(&mut self, cube: &Cube, target: &Cube, options: &RegridOptions) -> Result<Cube> {
        self.get_or_build(cube, target, options)?.apply(cube)
    }

    pub fn contains(&self, key: &RegridKey) -> bool {
        self.cache.contains(key)
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{axis_points, regular_cube};

    fn grids() -> (Cube, Cube, Cube) {
        let source = regular_cube(axis_points(0.0, 1.0, 8), axis_points(0.0, 1.0, 8));
        let coarse = regular_cube(axis_points(0.5, 2.0, 4), axis_points(0.5, 2.0, 4));
        let other = regular_cube(axis_points(1.0, 2.0, 3), axis_points(1.0, 2.0, 3));
        (source, coarse, other)
    }

    #[test]
    fn test_reuses_regridder() {
        let (source, target, _) = grids();
        let mut cache = RegridderCache::new(4);
        let options = RegridOptions::default();

        let first = cache.get_or_build(&source, &target, &options).unwrap();
        let second = cache.get_or_build(&source.clone(), &target, &options).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_options_are_part_of_the_key() {
        let (source, target, _) = grids();
        let mut cache = RegridderCache::new(4);
        let linear = RegridOptions::default();
        let nearest = RegridOptions {
            method: RegridMethod::Nearest,
            ..linear
        };
        let a = cache.get_or_build(&source, &target, &linear).unwrap();
        let b = cache.get_or_build(&source, &target, &nearest).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lru_eviction() {
        let (source, coarse, other) = grids();
        let mut cache = RegridderCache::new(1);
        let options = RegridOptions::default();

        cache.get_or_build(&source, &coarse, &options).unwrap();
        cache.get_or_build(&source, &other, &options).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 1);

        let key = RegridKey::new(&source, &coarse, &options).unwrap();
        assert!(!cache.contains(&key));
    }

    #[test]
    fn test_clear() {
        let (source, coarse, _) = grids();
        let mut cache = RegridderCache::from_config(&ProcessorConfig::default());
        cache.get_or_build(&source, &coarse, &RegridOptions::default()).unwrap();
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }
}
