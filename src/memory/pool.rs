use tracing::{debug, trace, warn};

use super::allocator::Allocator;
use super::buffer::Buffer;
use super::error::PoolError;
use super::size_class::{MAX_CLASS_SIZE, MIN_ALLOC_SIZE, class_capacity, exact_class, max_bits};
use super::stats::{AllocationStats, global_stats};
use crate::sync::{Arc, Mutex, lock};

/// Default largest request a pool serves: 64 KiB.
pub const DEFAULT_MAX_SIZE: usize = 64 * 1024;

/// Configuration for `BufferPool`. All fields have sensible defaults.
/// Set at init time via `BufferPool::with_config()`.
#[derive(Clone, Debug)]
pub struct BufferPoolConfig {
    /// Largest length `malloc` serves. Must be in `1..=2^31`. Default: 64 KiB.
    pub max_size: usize,

    /// Requests below this are rounded up to it before class resolution.
    /// Must be a power of two. Default: 64.
    pub min_alloc_size: usize,

    /// Max buffers cached per size class. A release into a full class drops
    /// the buffer instead. `None` retains everything. Default: `None`.
    pub retain_limit: Option<usize>,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            min_alloc_size: MIN_ALLOC_SIZE,
            retain_limit: None,
        }
    }
}

impl BufferPoolConfig {
    fn validate(&self) -> Result<(), PoolError> {
        if self.max_size == 0 || self.max_size > MAX_CLASS_SIZE {
            return Err(PoolError::InvalidConfig(format!(
                "max_size {} must be in 1..={MAX_CLASS_SIZE}",
                self.max_size
            )));
        }
        if exact_class(self.min_alloc_size).is_none() {
            return Err(PoolError::InvalidConfig(format!(
                "min_alloc_size {} must be a power of two up to {MAX_CLASS_SIZE}",
                self.min_alloc_size
            )));
        }
        Ok(())
    }
}

/// Free buffers of one class plus its reuse counters. Guarded by the class
/// mutex.
#[derive(Default)]
struct FreeList {
    buffers: Vec<Buffer>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Per-class counters returned by [`BufferPool::class_stats`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassStats {
    pub capacity: usize,
    /// Buffers currently cached.
    pub cached: usize,
    /// Mallocs served from the cache.
    pub hits: u64,
    /// Mallocs that created fresh storage.
    pub misses: u64,
    /// Releases dropped because the class was at its retain limit.
    pub evictions: u64,
}

/// Size-classed buffer pool.
///
/// Class `k` caches buffers of exactly `2^k` bytes behind its own mutex;
/// there is no lock spanning classes. Callers must not rely on a released
/// buffer coming back from a later `malloc`.
pub struct BufferPool {
    config: BufferPoolConfig,
    /// Largest capacity any class holds: `2^max_bits(max(max_size, min_alloc_size))`.
    max_capacity: usize,
    classes: Vec<Mutex<FreeList>>, // One free-list per size class
    stats: Arc<AllocationStats>,
}

impl BufferPool {
    /// Create a pool serving lengths up to `max_size`, reporting into the
    /// process-wide counters.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if `max_size` is 0 or above 2^31.
    pub fn new(max_size: usize) -> Result<Self, PoolError> {
        Self::with_config(BufferPoolConfig {
            max_size,
            ..BufferPoolConfig::default()
        })
    }

    /// Create a pool with custom configuration, reporting into the
    /// process-wide counters.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is rejected.
    pub fn with_config(config: BufferPoolConfig) -> Result<Self, PoolError> {
        Self::with_stats(config, Arc::clone(global_stats()))
    }

    /// Create a pool reporting into `stats` instead of the process-wide
    /// counters.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is rejected.
    pub fn with_stats(config: BufferPoolConfig, stats: Arc<AllocationStats>) -> Result<Self, PoolError> {
        config.validate()?;

        let top_class = max_bits(config.max_size.max(config.min_alloc_size));
        let mut classes = Vec::with_capacity(usize::from(top_class) + 1);
        for _ in 0..=top_class {
            classes.push(Mutex::new(FreeList::default()));
        }
        debug!(
            max_size = config.max_size,
            min_alloc_size = config.min_alloc_size,
            classes = classes.len(),
            "buffer pool created"
        );

        Ok(Self {
            max_capacity: class_capacity(top_class),
            config,
            classes,
            stats,
        })
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    /// Largest capacity `free` accepts.
    #[must_use]
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<AllocationStats> {
        &self.stats
    }

    #[inline]
    fn size_class(&self, size: usize) -> u8 {
        max_bits(size.max(self.config.min_alloc_size))
    }

    /// Borrow a buffer of length `size` and capacity `2^max_bits(max(size, min_alloc_size))`.
    ///
    /// Returns `None` if `size` is 0 or above `max_size`.
    pub fn malloc(&self, size: usize) -> Option<Buffer> {
        if size == 0 || size > self.config.max_size {
            return None;
        }
        let buf = self.take(self.size_class(size));
        self.stats.record_malloc(buf.capacity());
        Some(buf.with_len(size))
    }

    fn take(&self, bits: u8) -> Buffer {
        let mut list = lock(&self.classes[usize::from(bits)]);
        if let Some(buf) = list.buffers.pop() {
            list.hits += 1;
            return buf;
        }
        list.misses += 1;
        drop(list);

        let capacity = class_capacity(bits);
        trace!(capacity, "size class empty, allocating fresh buffer");
        Buffer::with_capacity(capacity)
    }

    /// Resize `buf` to `size`.
    ///
    /// Within capacity the same storage is re-viewed. Otherwise the content
    /// moves into a new buffer and `buf` is released. Sizes above `max_size`
    /// get a fresh unpooled buffer of exactly `size` bytes.
    pub fn realloc(&self, buf: Buffer, size: usize) -> Buffer {
        if size <= buf.capacity() {
            return buf.with_len(size);
        }
        let mut grown = self.malloc(size).unwrap_or_else(|| {
            debug!(size, max_size = self.config.max_size, "realloc beyond max_size, allocating unpooled");
            Buffer::zeroed(size)
        });
        let n = buf.len().min(size);
        grown[..n].copy_from_slice(&buf[..n]);
        if let Err(err) = self.free(buf) {
            debug!(%err, "realloc dropped a buffer the pool does not own");
        }
        grown
    }

    /// Return `buf` to the free-list of its class.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::IncorrectBufferSize` if the capacity is 0, above
    /// [`max_capacity`](Self::max_capacity), or not a power of two. The
    /// buffer is dropped.
    pub fn free(&self, buf: Buffer) -> Result<(), PoolError> {
        let capacity = buf.capacity();
        let bits = match exact_class(capacity) {
            Some(bits) if capacity <= self.max_capacity => bits,
            _ => {
                warn!(capacity, id = %buf.id(), "rejected release of foreign buffer");
                return Err(PoolError::IncorrectBufferSize {
                    capacity,
                    max_capacity: self.max_capacity,
                });
            }
        };
        self.stats.record_free(capacity);

        let mut list = lock(&self.classes[usize::from(bits)]);
        if self
            .config
            .retain_limit
            .is_some_and(|limit| list.buffers.len() >= limit)
        {
            list.evictions += 1;
            drop(list);
            trace!(capacity, "size class full, dropping released buffer");
            return Ok(());
        }
        list.buffers.push(buf);
        Ok(())
    }

    /// Number of buffers cached across all classes.
    #[must_use]
    pub fn cached_buffers(&self) -> usize {
        self.classes.iter().map(|class| lock(class).buffers.len()).sum()
    }

    /// Bytes of capacity cached across all classes.
    #[must_use]
    pub fn cached_bytes(&self) -> usize {
        self.classes
            .iter()
            .enumerate()
            .map(|(bits, class)| lock(class).buffers.len() * class_capacity(bits as u8))
            .sum()
    }

    /// Per-class counters, indexed by class.
    #[must_use]
    pub fn class_stats(&self) -> Vec<ClassStats> {
        self.classes
            .iter()
            .enumerate()
            .map(|(bits, class)| {
                let list = lock(class);
                ClassStats {
                    capacity: class_capacity(bits as u8),
                    cached: list.buffers.len(),
                    hits: list.hits,
                    misses: list.misses,
                    evictions: list.evictions,
                }
            })
            .collect()
    }

    /// Drop every cached buffer.
    pub fn trim(&self) {
        let mut released = 0usize;
        for class in &self.classes {
            let drained = std::mem::take(&mut lock(class).buffers);
            released += drained.iter().map(Buffer::capacity).sum::<usize>();
        }
        debug!(bytes = released, "buffer pool trimmed");
    }
}

impl Allocator for BufferPool {
    fn malloc(&self, size: usize) -> Option<Buffer> {
        BufferPool::malloc(self, size)
    }

    fn realloc(&self, buf: Buffer, size: usize) -> Buffer {
        BufferPool::realloc(self, buf, size)
    }

    fn free(&self, buf: Buffer) -> Result<(), PoolError> {
        BufferPool::free(self, buf)
    }
}
