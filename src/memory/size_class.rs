//! Power-of-two size classes.
//!
//! A size class `k` holds buffers of exactly `1 << k` bytes. The class for a
//! length is found with the de Bruijn highest-bit lookup over 32 bits, then
//! corrected by one when the estimate falls short.

/// Requests smaller than this are rounded up before class resolution so the
/// pool does not fragment into many tiny classes.
pub const MIN_ALLOC_SIZE: usize = 64;

/// Largest class a pool may serve. Keeps every size inside the 32-bit domain
/// the de Bruijn lookup covers.
pub const MAX_CLASS_SIZE: usize = 1 << 31;

const DE_BRUIJN_MULTIPLIER: u32 = 0x077C_B531;

/// Bit position of each single-bit `u32`, indexed by `(v * multiplier) >> 27`.
const DE_BRUIJN_POSITION: [u8; 32] = [
    0, 1, 28, 2, 29, 14, 24, 3, 30, 22, 20, 15, 25, 17, 4, 8, 31, 27, 13, 23, 21, 19, 16, 7, 26,
    12, 18, 6, 11, 5, 10, 9,
];

/// Smallest `k` with `1 << k >= size`.
///
/// `size == 0` maps to class 0. Sizes above [`MAX_CLASS_SIZE`] leave the
/// 32-bit lookup domain and are answered from `leading_zeros` instead, so the
/// result stays exact for every `usize`.
#[inline]
#[must_use]
pub const fn max_bits(size: usize) -> u8 {
    if size > MAX_CLASS_SIZE {
        return (usize::BITS - (size - 1).leading_zeros()) as u8;
    }
    let mut v = size as u32;
    // Spread the highest set bit into every lower position, then isolate it.
    v |= v >> 1;
    v |= v >> 2;
    v |= v >> 4;
    v |= v >> 8;
    v |= v >> 16;
    v = (v >> 1) + 1;
    let mut bits = DE_BRUIJN_POSITION[(v.wrapping_mul(DE_BRUIJN_MULTIPLIER) >> 27) as usize];
    if size > 1usize << bits {
        bits += 1;
    }
    bits
}

/// Capacity of buffers stored in class `bits`.
#[inline]
#[must_use]
pub const fn class_capacity(bits: u8) -> usize {
    1usize << bits
}

/// Returns the class `capacity` belongs to, if it is an exact class size.
#[inline]
#[must_use]
pub const fn exact_class(capacity: usize) -> Option<u8> {
    if capacity == 0 || capacity > MAX_CLASS_SIZE {
        return None;
    }
    let bits = max_bits(capacity);
    if class_capacity(bits) == capacity {
        Some(bits)
    } else {
        None
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn test_max_bits_known_values() {
        assert_eq!(max_bits(1), 0);
        assert_eq!(max_bits(2), 1);
        assert_eq!(max_bits(3), 2);
        assert_eq!(max_bits(64), 6);
        assert_eq!(max_bits(65), 7);
        assert_eq!(max_bits(1024), 10);
        assert_eq!(max_bits(1025), 11);
    }

    #[test]
    fn test_max_bits_zero_is_class_zero() {
        assert_eq!(max_bits(0), 0);
    }

    #[test]
    fn test_max_bits_matches_next_power_of_two() {
        // Dense sweep over the small range, then boundaries of every class.
        for size in 1..=70_000usize {
            let expected = size.next_power_of_two().trailing_zeros() as u8;
            assert_eq!(max_bits(size), expected, "size {size}");
        }
        for k in 1..=31u32 {
            let p = 1usize << k;
            assert_eq!(max_bits(p), k as u8, "exact power 2^{k}");
            assert_eq!(max_bits(p - 1), if k == 1 { 0 } else { k as u8 }, "2^{k} - 1");
            if p < MAX_CLASS_SIZE {
                assert_eq!(max_bits(p + 1), k as u8 + 1, "2^{k} + 1");
            }
        }
    }

    #[test]
    fn test_max_bits_top_class() {
        assert_eq!(max_bits(MAX_CLASS_SIZE), 31);
        assert_eq!(max_bits(MAX_CLASS_SIZE - 1), 31);
    }

    #[test]
    fn test_max_bits_above_top_class() {
        assert_eq!(max_bits(MAX_CLASS_SIZE + 1), 32);
        assert_eq!(max_bits(1 << 32), 32);
        assert_eq!(max_bits((1 << 32) + 1), 33);
        assert_eq!(max_bits(1 << 40), 40);
        assert_eq!(max_bits((1 << 40) + 1), 41);
        assert_eq!(max_bits(usize::MAX), 64);
    }

    #[test]
    fn test_exact_class() {
        assert_eq!(exact_class(0), None);
        assert_eq!(exact_class(64), Some(6));
        assert_eq!(exact_class(100), None);
        assert_eq!(exact_class(4096), Some(12));
        assert_eq!(exact_class(MAX_CLASS_SIZE), Some(31));
        assert_eq!(exact_class(MAX_CLASS_SIZE * 2), None);
        assert_eq!(class_capacity(exact_class(256).unwrap()), 256);
    }
}
