//! Process-wide default pool and the free functions that forward to it.

use super::buffer::Buffer;
use super::diagnostic::DiagnosticPool;
use super::error::PoolError;
use super::size_class::MIN_ALLOC_SIZE;
use crate::sync::OnceLock;

static DEFAULT_POOL: OnceLock<DiagnosticPool> = OnceLock::new();

/// The default pool, created on first use with a 64-byte floor.
///
/// It is a [`DiagnosticPool`]: a double free through these functions ends
/// the process.
pub fn default_pool() -> &'static DiagnosticPool {
    DEFAULT_POOL.get_or_init(|| DiagnosticPool::new(MIN_ALLOC_SIZE))
}

/// [`DiagnosticPool::malloc`] on the default pool.
pub fn malloc(size: usize) -> Option<Buffer> {
    default_pool().malloc(size)
}

/// [`DiagnosticPool::realloc`] on the default pool.
#[track_caller]
pub fn realloc(buf: Buffer, size: usize) -> Buffer {
    default_pool().realloc(buf, size)
}

/// [`DiagnosticPool::free`] on the default pool.
#[track_caller]
pub fn free(buf: Buffer) -> Result<(), PoolError> {
    default_pool().free(buf)
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_is_shared() {
        assert!(std::ptr::eq(default_pool(), default_pool()));
        assert_eq!(default_pool().min_size(), 64);
    }

    #[test]
    fn test_free_functions_round_trip() {
        let mut buf = malloc(5).unwrap();
        buf.copy_from_slice(b"hello");
        let buf = realloc(buf, 300);
        assert_eq!(buf.len(), 300);
        assert_eq!(&buf[..5], b"hello");
        free(buf).unwrap();
        assert!(malloc(0).is_none());
    }
}
