//! Owned byte buffers handed out by the allocators.
//!
//! A [`Buffer`] is a boxed byte region (its capacity) with a caller-visible
//! prefix (its length). Pools recycle the backing storage, so the bytes past
//! `len` and any bytes exposed by growing `len` hold whatever the previous
//! owner left there.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::sync::atomic::{AtomicU64, Ordering};

crate::sync::static_atomic! {
    static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);
}

/// Process-unique identity of a buffer's backing storage.
///
/// Assigned when the storage is created and kept for its whole life, across
/// every release and reissue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> Self {
        Self(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Variable-length view over a fixed-capacity byte region.
///
/// Cloning copies the bytes but keeps the identity and generation: the clone
/// is an alias of the same pooled slot, and releasing both is a double free.
#[derive(Clone)]
pub struct Buffer {
    storage: Box<[u8]>,
    len: usize,
    id: BufferId,
    generation: u64,
}

impl Buffer {
    /// Allocate zeroed storage of exactly `capacity` bytes with length 0.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_storage(vec![0u8; capacity].into_boxed_slice(), 0)
    }

    /// Allocate zeroed storage of exactly `len` bytes, fully visible.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self::from_storage(vec![0u8; len].into_boxed_slice(), len)
    }

    fn from_storage(storage: Box<[u8]>, len: usize) -> Self {
        debug_assert!(len <= storage.len());
        Self {
            storage,
            len,
            id: BufferId::next(),
            generation: 0,
        }
    }

    /// Caller-visible length.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the backing storage.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Issue generation, bumped by pools that track reissues.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Start of the backing storage. Two buffers with the same pointer share
    /// storage.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.storage.as_ptr()
    }

    /// Re-view the buffer with a new length. Returns `None` when `len`
    /// exceeds the capacity.
    #[must_use]
    pub fn resized(mut self, len: usize) -> Option<Self> {
        if len > self.capacity() {
            return None;
        }
        self.len = len;
        Some(self)
    }

    /// Re-view with `len <= capacity`, enforced by the caller.
    #[inline]
    pub(crate) fn with_len(mut self, len: usize) -> Self {
        debug_assert!(len <= self.capacity());
        self.len = len;
        self
    }

    /// Drop the identity and hand back the visible bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        let mut vec = self.storage.into_vec();
        vec.truncate(self.len);
        vec
    }
}

impl From<Vec<u8>> for Buffer {
    /// Adopt `vec`; the capacity becomes the vector's length, shrinking any
    /// spare allocation.
    fn from(vec: Vec<u8>) -> Self {
        let len = vec.len();
        Self::from_storage(vec.into_boxed_slice(), len)
    }
}

impl Deref for Buffer {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.storage[..self.len]
    }
}

impl DerefMut for Buffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.storage[..self.len]
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl AsMut<[u8]> for Buffer {
    fn as_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_len_and_capacity() {
        let buf = Buffer::with_capacity(128);
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 128);

        let buf = buf.resized(100).unwrap();
        assert_eq!(buf.len(), 100);
        assert_eq!(buf.capacity(), 128);
        assert_eq!(&buf[..], &[0u8; 100][..]);
    }

    #[test]
    fn test_resize_beyond_capacity_fails() {
        let buf = Buffer::zeroed(16);
        assert!(buf.resized(17).is_none());
    }

    #[test]
    fn test_resize_keeps_stale_bytes() {
        let mut buf = Buffer::zeroed(8);
        buf.copy_from_slice(b"abcdefgh");
        let buf = buf.resized(2).unwrap();
        assert_eq!(&buf[..], b"ab");
        let buf = buf.resized(8).unwrap();
        assert_eq!(&buf[..], b"abcdefgh");
    }

    #[test]
    fn test_ids_are_unique_and_clones_alias() {
        let a = Buffer::with_capacity(64);
        let b = Buffer::with_capacity(64);
        assert_ne!(a.id(), b.id());

        let c = a.clone();
        assert_eq!(a.id(), c.id());
        assert_eq!(a.generation(), c.generation());
        assert_ne!(a.as_ptr(), c.as_ptr());
    }

    #[test]
    fn test_from_vec_and_back() {
        let buf = Buffer::from(b"hello".to_vec());
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.capacity(), 5);
        assert_eq!(buf.into_vec(), b"hello".to_vec());
    }
}
