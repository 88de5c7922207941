//! Kernel cache implementation
//!
//! LRU cache of whole kernel-matrix rows. The SMO solver asks for complete
//! rows of Q, so caching at row granularity lets one lookup serve every
//! gradient update that touches that row.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::rc::Rc;

/// Bookkeeping bytes charged per cached row on top of its values
const ROW_OVERHEAD_BYTES: usize = 64;

/// LRU cache for kernel matrix rows
pub struct KernelCache {
    cache: LruCache<usize, Rc<[f64]>>,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a new kernel cache holding at most `capacity` rows
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Create a kernel cache bounded by `memory_bytes`, for rows of `row_len` values.
    ///
    /// At least two rows are always kept so the two rows of a working pair
    /// never evict each other. There are only `row_len` distinct rows, so the
    /// capacity never exceeds that.
    pub fn with_memory_limit(memory_bytes: usize, row_len: usize) -> Self {
        let row_bytes = row_len * std::mem::size_of::<f64>() + ROW_OVERHEAD_BYTES;
        Self::new((memory_bytes / row_bytes).clamp(2, row_len.max(2)))
    }

    /// Budget in bytes for a cache size given in megabytes
    pub fn megabytes(cache_size: f64) -> usize {
        if cache_size.is_finite() && cache_size > 0.0 {
            (cache_size * (1 << 20) as f64) as usize
        } else {
            0
        }
    }

    /// Get a row from cache
    pub fn get(&mut self, i: usize) -> Option<Rc<[f64]>> {
        if let Some(row) = self.cache.get(&i) {
            self.hits += 1;
            Some(Rc::clone(row))
        } else {
            self.misses += 1;
            None
        }
    }

    /// Put a row into cache
    pub fn put(&mut self, i: usize, row: Rc<[f64]>) {
        self.cache.put(i, row);
    }

    /// Return the cached row `i`, computing and storing it on a miss
    pub fn get_or_compute<F>(&mut self, i: usize, compute: F) -> Rc<[f64]>
    where
        F: FnOnce() -> Vec<f64>,
    {
        if let Some(row) = self.get(i) {
            return row;
        }
        let row: Rc<[f64]> = Rc::from(compute());
        self.put(i, Rc::clone(&row));
        row
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.cache.cap().get(),
            size: self.cache.len(),
        }
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.cache.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Maximum number of rows
    pub capacity: usize,
    /// Rows currently held
    pub size: usize,
}
