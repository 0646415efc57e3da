//! The capability shared by every allocator shape, and configuration-driven
//! selection between them.

use super::buffer::Buffer;
use super::diagnostic::{DiagnosticPool, DiagnosticPoolConfig};
use super::error::PoolError;
use super::native::NativeAllocator;
use super::pool::{BufferPool, BufferPoolConfig};

/// Malloc/Realloc/Free over owned [`Buffer`]s.
///
/// Implementations are shareable across threads and never block beyond
/// internal lock contention.
pub trait Allocator: Send + Sync {
    /// Borrow a buffer of length `size`. Returns `None` for `size == 0` or a
    /// size the allocator cannot serve.
    fn malloc(&self, size: usize) -> Option<Buffer>;

    /// Resize `buf` to `size`, reusing it when the capacity suffices and
    /// otherwise moving its content into a larger buffer.
    #[track_caller]
    fn realloc(&self, buf: Buffer, size: usize) -> Buffer;

    /// Give `buf` back to the allocator.
    #[track_caller]
    fn free(&self, buf: Buffer) -> Result<(), PoolError>;
}

/// Which allocator shape to build.
#[derive(Clone, Debug)]
pub enum AllocatorKind {
    Pooled(BufferPoolConfig),
    Passthrough,
    Diagnostic(DiagnosticPoolConfig),
}

impl Default for AllocatorKind {
    fn default() -> Self {
        AllocatorKind::Pooled(BufferPoolConfig::default())
    }
}

impl AllocatorKind {
    /// Construct the selected allocator.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if a pooled configuration is
    /// rejected.
    pub fn build(&self) -> Result<Box<dyn Allocator>, PoolError> {
        Ok(match self {
            AllocatorKind::Pooled(config) => Box::new(BufferPool::with_config(config.clone())?),
            AllocatorKind::Passthrough => Box::new(NativeAllocator),
            AllocatorKind::Diagnostic(config) => Box::new(DiagnosticPool::with_config(config.clone())),
        })
    }
}
