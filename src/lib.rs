//! Size-classed byte buffer pools.
//!
//! [`BufferPool`] recycles buffers in power-of-two classes, [`NativeAllocator`]
//! allocates without pooling, and [`DiagnosticPool`] trades throughput for
//! double-free detection. All three implement [`Allocator`].

#[cfg(not(target_pointer_width = "64"))]
compile_error!("mempool supports only 64-bit targets.");

pub(crate) mod sync;

// public module: contains implementation details (hidden via pub(crate))
// and TEST_MUTEX (public for tests)
pub mod memory;

// allocators
pub use memory::allocator::{Allocator, AllocatorKind};
pub use memory::diagnostic::{
    CaptureMode, DiagnosticPool, DiagnosticPoolConfig, LifecycleViolation, ReleaseContext,
    ViolationHook, ViolationKind, exit_on_violation, panic_on_violation,
};
pub use memory::native::NativeAllocator;
pub use memory::pool::{BufferPool, BufferPoolConfig, ClassStats, DEFAULT_MAX_SIZE};

// buffers and size classes
pub use memory::buffer::{Buffer, BufferId};
pub use memory::size_class::{MAX_CLASS_SIZE, MIN_ALLOC_SIZE, class_capacity, exact_class, max_bits};

// process-wide defaults and stats
pub use memory::global::{default_pool, free, malloc, realloc};
pub use memory::stats::{AllocationStats, StatsSnapshot, global_stats, state};

// errors
pub use memory::error::PoolError;
