use super::allocator::Allocator;
use super::buffer::Buffer;
use super::error::PoolError;

/// Allocator that never pools: every malloc is a fresh exact-size buffer and
/// free just drops it.
///
/// Drop-in substitute for a pool where reuse is unwanted, e.g. short-lived
/// processes or when chasing a suspected pooling bug.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeAllocator;

impl Allocator for NativeAllocator {
    fn malloc(&self, size: usize) -> Option<Buffer> {
        if size == 0 {
            return None;
        }
        Some(Buffer::zeroed(size))
    }

    fn realloc(&self, buf: Buffer, size: usize) -> Buffer {
        if size <= buf.capacity() {
            return buf.with_len(size);
        }
        let mut grown = Buffer::zeroed(size);
        grown[..buf.len()].copy_from_slice(&buf);
        grown
    }

    fn free(&self, _buf: Buffer) -> Result<(), PoolError> {
        Ok(())
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn test_malloc_is_exact() {
        let buf = NativeAllocator.malloc(100).unwrap();
        assert_eq!(buf.len(), 100);
        assert_eq!(buf.capacity(), 100);
        assert!(NativeAllocator.malloc(0).is_none());
    }

    #[test]
    fn test_realloc() {
        let mut buf = NativeAllocator.malloc(4).unwrap();
        buf.copy_from_slice(b"rust");
        let ptr = buf.as_ptr();

        let buf = NativeAllocator.realloc(buf, 2);
        assert_eq!(buf.as_ptr(), ptr);
        assert_eq!(&buf[..], b"ru");

        let buf = NativeAllocator.realloc(buf, 10);
        assert_ne!(buf.as_ptr(), ptr);
        assert_eq!(buf.capacity(), 10);
        assert_eq!(&buf[..2], b"ru");
    }

    #[test]
    fn test_free_always_succeeds() {
        assert!(NativeAllocator.free(Buffer::with_capacity(100)).is_ok());
        assert!(NativeAllocator.free(Buffer::with_capacity(0)).is_ok());
    }
}
