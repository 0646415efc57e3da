//! Process-wide allocation counters.
//!
//! All counters use `Relaxed` ordering. Individual counter values are
//! eventually consistent. Cross-counter snapshots may be torn (e.g. a free
//! may be visible before the malloc it pairs with). This is acceptable for
//! leak and pressure monitoring. Do NOT use these values for allocation
//! decisions.

use std::fmt;

use crate::sync::atomic::{AtomicU64, Ordering};
use crate::sync::{Arc, OnceLock};

/// Monotonic event counter.
pub(crate) struct Counter(AtomicU64);

impl Counter {
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[cfg(loom)]
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    pub fn add(&self, val: usize) {
        self.0.fetch_add(val as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Malloc/free totals reported by [`BufferPool`](crate::BufferPool).
///
/// Bytes are counted by buffer capacity, not requested length.
pub struct AllocationStats {
    malloc_count: Counter,
    malloc_bytes: Counter,
    free_count: Counter,
    free_bytes: Counter,
}

impl Default for AllocationStats {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationStats {
    #[cfg(not(loom))]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            malloc_count: Counter::new(),
            malloc_bytes: Counter::new(),
            free_count: Counter::new(),
            free_bytes: Counter::new(),
        }
    }

    #[cfg(loom)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            malloc_count: Counter::new(),
            malloc_bytes: Counter::new(),
            free_count: Counter::new(),
            free_bytes: Counter::new(),
        }
    }

    #[inline]
    pub(crate) fn record_malloc(&self, capacity: usize) {
        self.malloc_count.add(1);
        self.malloc_bytes.add(capacity);
    }

    #[inline]
    pub(crate) fn record_free(&self, capacity: usize) {
        self.free_count.add(1);
        self.free_bytes.add(capacity);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            malloc_count: self.malloc_count.get(),
            malloc_bytes: self.malloc_bytes.get(),
            free_count: self.free_count.get(),
            free_bytes: self.free_bytes.get(),
        }
    }
}

/// Point-in-time copy of [`AllocationStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub malloc_count: u64,
    pub malloc_bytes: u64,
    pub free_count: u64,
    pub free_bytes: u64,
}

impl StatsSnapshot {
    /// Mallocs not yet matched by a free. Negative on a torn read.
    #[must_use]
    pub fn outstanding_count(&self) -> i64 {
        self.malloc_count as i64 - self.free_count as i64
    }

    #[must_use]
    pub fn outstanding_bytes(&self) -> i64 {
        self.malloc_bytes as i64 - self.free_bytes as i64
    }

    /// Human-readable report, one counter per line.
    #[must_use]
    pub fn report(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "malloc num : {}", self.malloc_count)?;
        writeln!(f, "malloc size: {}", self.malloc_bytes)?;
        writeln!(f, "free num   : {}", self.free_count)?;
        writeln!(f, "free size  : {}", self.free_bytes)?;
        writeln!(f, "left times : {}", self.outstanding_count())?;
        writeln!(f, "left size  : {}", self.outstanding_bytes())
    }
}

static GLOBAL_STATS: OnceLock<Arc<AllocationStats>> = OnceLock::new();

/// Counters shared by every pool that was not given its own sink.
pub fn global_stats() -> &'static Arc<AllocationStats> {
    GLOBAL_STATS.get_or_init(|| Arc::new(AllocationStats::new()))
}

/// Snapshot of the process-wide counters.
#[must_use]
pub fn state() -> StatsSnapshot {
    global_stats().snapshot()
}
